use log::info;

use crate::{
    apu::Apu, cartridge::Cartridge, joypad::Joypad, ppu::Ppu, serial::Serial, timer::Timer,
};

const WRAM_BANK_SIZE: usize = 0x1000;
const OAM_DMA_LEN: u16 = 0xA0;
const HDMA_BLOCK: u16 = 0x10;

/// Transfer mode for CGB VRAM DMA operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmaMode {
    /// General DMA (immediate)
    Gdma,
    /// HBlank DMA
    Hdma,
}

#[derive(Debug)]
struct HdmaState {
    src: u16,
    /// Destination offset inside VRAM (0x0000-0x1FF0)
    dst: u16,
    /// Blocks of 0x10 bytes still to copy
    blocks: u8,
    mode: DmaMode,
    active: bool,
}

impl HdmaState {
    fn new() -> Self {
        Self {
            src: 0,
            dst: 0,
            blocks: 0,
            mode: DmaMode::Gdma,
            active: false,
        }
    }
}

pub struct Mmu {
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub hram: [u8; 0x7F],
    /// I/O registers with no dedicated peripheral, kept as plain bytes.
    io: [u8; 0x80],
    pub cart: Option<Cartridge>,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub serial: Serial,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub joypad: Joypad,
    hdma: HdmaState,
    pub key1: u8,
    dma: u8,
    cgb_mode: bool,
}

impl Mmu {
    pub fn new(cgb: bool, sound: bool) -> Self {
        Self {
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            hram: [0; 0x7F],
            io: [0; 0x80],
            cart: None,
            if_reg: 0,
            ie_reg: 0,
            serial: Serial::new(),
            ppu: Ppu::new(cgb),
            apu: Apu::new(sound),
            timer: Timer::new(),
            joypad: Joypad::new(),
            hdma: HdmaState::new(),
            key1: 0,
            dma: 0xFF,
            cgb_mode: cgb,
        }
    }

    /// Seeds the I/O registers with the values the boot ROM leaves behind.
    pub fn apply_boot_state(&mut self) {
        self.if_reg = 0xE1;
        self.ppu.apply_boot_state();
        self.apu.apply_boot_state();
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb_mode
    }

    /// CPU clock multiplier: 2 in CGB double-speed mode, otherwise 1.
    pub fn speed(&self) -> u32 {
        if self.key1 & 0x80 != 0 { 2 } else { 1 }
    }

    /// Performs a speed switch armed through KEY1. Returns true if the speed
    /// changed.
    pub fn switch_speed(&mut self) -> bool {
        if !self.cgb_mode || self.key1 & 0x01 == 0 {
            return false;
        }
        self.key1 = (self.key1 ^ 0x80) & 0x80;
        info!("CPU speed switched to {}x", self.speed());
        true
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xC000..=0xCFFF => self.wram[0][usize::from(addr - 0xC000)],
            0xD000..=0xDFFF => self.wram[self.wram_bank][usize::from(addr - 0xD000)],
            0xE000..=0xFDFF => self.read_byte(addr - 0x2000),
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF3F => self.apu.read(addr),
            0xFF46 => self.dma,
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => self.ppu.read_reg(addr),
            0xFF4D if self.cgb_mode => (self.key1 & 0x81) | 0x7E,
            0xFF51..=0xFF54 if self.cgb_mode => 0xFF,
            0xFF55 if self.cgb_mode => self.hdma_status(),
            0xFF70 if self.cgb_mode => 0xF8 | self.wram_bank as u8,
            0xFF4D | 0xFF51..=0xFF55 | 0xFF70 => 0xFF,
            0xFF80..=0xFFFE => self.hram[usize::from(addr - 0xFF80)],
            0xFFFF => self.ie_reg,
            _ => self.io[usize::from(addr - 0xFF00)],
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF0F => self.if_reg = val,
            0xFF10..=0xFF3F => self.apu.write(addr, val),
            0xFF05..=0xFF07 => self.timer.write(addr, val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val, &mut self.if_reg),
            0xFF04 => self.timer.reset_div(),
            0xFF46 => self.oam_dma(val),
            0x0000..=0x7FFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_rom(addr, val);
                }
            }
            0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_ram(addr, val);
                }
            }
            0xE000..=0xFDFF => self.write_byte(addr - 0x2000, val),
            0xFEA0..=0xFEFF => {}
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xC000..=0xCFFF => self.wram[0][usize::from(addr - 0xC000)] = val,
            0xD000..=0xDFFF => self.wram[self.wram_bank][usize::from(addr - 0xD000)] = val,
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => self.ppu.write_reg(addr, val),
            0xFF4D if self.cgb_mode => self.key1 = (self.key1 & 0x80) | (val & 0x01),
            0xFF51 if self.cgb_mode => self.hdma.src = (u16::from(val) << 8) | (self.hdma.src & 0x00F0),
            0xFF52 if self.cgb_mode => self.hdma.src = (self.hdma.src & 0xFF00) | u16::from(val & 0xF0),
            0xFF53 if self.cgb_mode => {
                self.hdma.dst = (u16::from(val & 0x1F) << 8) | (self.hdma.dst & 0x00F0)
            }
            0xFF54 if self.cgb_mode => self.hdma.dst = (self.hdma.dst & 0x1F00) | u16::from(val & 0xF0),
            0xFF55 if self.cgb_mode => self.start_hdma(val),
            0xFF70 if self.cgb_mode => self.wram_bank = usize::from(val & 0x07).max(1),
            0xFF4D | 0xFF51..=0xFF55 | 0xFF70 => {}
            0xFF80..=0xFFFE => self.hram[usize::from(addr - 0xFF80)] = val,
            0xFFFF => self.ie_reg = val,
            _ => self.io[usize::from(addr - 0xFF00)] = val,
        }
    }

    /// Copies 0xA0 bytes from `page << 8` into OAM.
    fn oam_dma(&mut self, page: u8) {
        self.dma = page;
        let src = u16::from(page) << 8;
        for i in 0..OAM_DMA_LEN {
            let byte = self.read_byte(src.wrapping_add(i));
            self.ppu.oam[usize::from(i)] = byte;
        }
    }

    fn hdma_status(&self) -> u8 {
        if self.hdma.active {
            self.hdma.blocks.saturating_sub(1) & 0x7F
        } else if self.hdma.blocks > 0 {
            // cancelled mid-transfer
            0x80 | (self.hdma.blocks.saturating_sub(1) & 0x7F)
        } else {
            0xFF
        }
    }

    fn start_hdma(&mut self, val: u8) {
        if self.hdma.active && self.hdma.mode == DmaMode::Hdma && val & 0x80 == 0 {
            self.hdma.active = false;
            return;
        }
        self.hdma.blocks = (val & 0x7F) + 1;
        if val & 0x80 != 0 {
            self.hdma.mode = DmaMode::Hdma;
            self.hdma.active = true;
        } else {
            self.hdma.mode = DmaMode::Gdma;
            while self.hdma.blocks > 0 {
                self.hdma_block();
            }
        }
    }

    fn hdma_block(&mut self) {
        for _ in 0..HDMA_BLOCK {
            let byte = self.read_byte(self.hdma.src);
            self.ppu.write_vram(0x8000 | (self.hdma.dst & 0x1FFF), byte);
            self.hdma.src = self.hdma.src.wrapping_add(1);
            self.hdma.dst = (self.hdma.dst + 1) & 0x1FFF;
        }
        self.hdma.blocks = self.hdma.blocks.saturating_sub(1);
        if self.hdma.blocks == 0 {
            self.hdma.active = false;
        }
    }

    /// Runs one 0x10-byte H-blank DMA block if a transfer is active.
    pub fn hdma_hblank_transfer(&mut self) {
        if self.hdma.active && self.hdma.mode == DmaMode::Hdma {
            self.hdma_block();
        }
    }

    /// Advances the timer, PPU, APU and cartridge clock by `cycles` CPU
    /// cycles.
    pub fn tick(&mut self, cycles: u32) {
        let speed = self.speed();
        self.timer.step(cycles, &mut self.if_reg);
        if self.ppu.update(cycles, speed, &mut self.if_reg) {
            self.hdma_hblank_transfer();
        }
        self.apu.buffer(cycles, speed);
        if let Some(cart) = self.cart.as_mut() {
            cart.step_rtc(cycles / speed);
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new(false, false)
    }
}
