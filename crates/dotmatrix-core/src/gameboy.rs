use std::io;
use std::path::Path;

use log::{debug, info};

use crate::{
    cartridge::Cartridge,
    cpu::Cpu,
    error::{CpuError, LoadError},
    joypad::{Button, ButtonInput},
    mmu::Mmu,
    options::{DebugFlags, GameBoyOptions},
    ppu::{DmgPalette, Frame},
};

/// CPU clock in normal speed mode.
pub const CLOCK_HZ: u32 = 4_194_304;
pub const FRAME_RATE: u32 = 60;
/// Cycle budget of one call to [`GameBoy::update`] at normal speed.
pub const CYCLES_FRAME: u32 = CLOCK_HZ / FRAME_RATE;

/// Cycles a halted CPU idles before the next interrupt check.
const HALT_CYCLES: u32 = 4;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    cgb: bool,
    paused: bool,
    debug: DebugFlags,
}

impl GameBoy {
    /// Load a ROM (or single-file zip) from disk.
    pub fn from_file<P: AsRef<Path>>(path: P, options: GameBoyOptions) -> Result<Self, LoadError> {
        let cart = Cartridge::from_file_with_interval(path, options.save_interval)?;
        Ok(Self::with_cartridge(cart, options))
    }

    /// Build a machine around an in-memory ROM image. Nothing is persisted.
    pub fn from_rom(rom: Vec<u8>, options: GameBoyOptions) -> Result<Self, LoadError> {
        let cart = Cartridge::from_bytes(rom)?;
        Ok(Self::with_cartridge(cart, options))
    }

    fn with_cartridge(cart: Cartridge, options: GameBoyOptions) -> Self {
        let cgb = options.cgb && cart.mode().supports_cgb();
        info!("Starting in {} mode", if cgb { "CGB" } else { "DMG" });

        let mut mmu = Mmu::new(cgb, options.sound);
        mmu.load_cart(cart);
        mmu.apply_boot_state();
        mmu.ppu.set_dmg_palette(options.palette);
        if let Some(callback) = options.transfer_callback {
            mmu.serial.set_callback(callback);
        }

        Self {
            cpu: Cpu::new(cgb),
            mmu,
            cgb,
            paused: false,
            debug: DebugFlags::default(),
        }
    }

    /// Run one video frame worth of CPU cycles. Returns the cycles executed,
    /// or `Ok(0)` while paused.
    ///
    /// An unknown opcode aborts the frame and leaves the CPU where the
    /// opcode was fetched.
    pub fn update(&mut self) -> Result<u32, CpuError> {
        if self.paused {
            return Ok(0);
        }

        let mut cycles = 0;
        while cycles < CYCLES_FRAME * self.mmu.speed() {
            let op_cycles = if self.cpu.halted {
                HALT_CYCLES
            } else {
                self.cpu.execute_next_opcode(&mut self.mmu)?
            };
            self.mmu.tick(op_cycles);
            cycles += op_cycles;

            let irq_cycles = self.cpu.service_interrupts(&mut self.mmu);
            if irq_cycles > 0 {
                self.mmu.tick(irq_cycles);
                cycles += irq_cycles;
            }
        }

        if let Some(cart) = self.mmu.cart.as_mut() {
            cart.publish_save();
        }
        Ok(cycles)
    }

    pub fn set_paused(&mut self, paused: bool) {
        debug!("{}", if paused { "Paused" } else { "Resumed" });
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn press_button(&mut self, button: Button) {
        if self.paused {
            return;
        }
        self.mmu.joypad.press(button, &mut self.mmu.if_reg);
    }

    pub fn release_button(&mut self, button: Button) {
        self.mmu.joypad.release(button);
    }

    /// Apply a frontend's batched button edges: releases first, then presses.
    pub fn process_input(&mut self, input: &ButtonInput) {
        for &button in &input.released {
            self.release_button(button);
        }
        for &button in &input.pressed {
            self.press_button(button);
        }
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug = flags;
        self.cpu.trace = flags.output_opcodes;
        self.mmu.ppu.hide_background = flags.hide_background;
        self.mmu.ppu.hide_sprites = flags.hide_sprites;
    }

    /// The last completed frame. Stable between V-blanks.
    pub fn prepared_frame(&self) -> &Frame {
        self.mmu.ppu.prepared_frame()
    }

    pub fn cartridge_title(&self) -> &str {
        self.mmu.cart.as_ref().map_or("", |c| c.title())
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn bg_map_string(&self) -> String {
        self.mmu.ppu.bg_map_string()
    }

    pub fn cycle_palette(&mut self) -> DmgPalette {
        let palette = self.mmu.ppu.cycle_palette();
        debug!("DMG palette: {palette}");
        palette
    }

    /// Mute or unmute sound channel `n` (1-4). Returns the new muted state.
    pub fn toggle_sound_channel(&mut self, n: usize) -> Option<bool> {
        self.mmu.apu.toggle_channel(n)
    }

    /// Take the stereo samples generated since the last call.
    pub fn drain_audio(&mut self) -> Vec<[i16; 2]> {
        self.mmu.apu.drain_samples()
    }

    /// Take the bytes sent over the serial port since the last call.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.mmu.serial.take_output()
    }

    /// Flush battery RAM to disk now.
    pub fn save(&mut self) -> io::Result<()> {
        match self.mmu.cart.as_mut() {
            Some(cart) => cart.save(),
            None => Ok(()),
        }
    }
}
