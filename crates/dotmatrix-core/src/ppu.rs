use std::fmt::Write as _;

use crate::bits;
use crate::interrupts::{self, Interrupt};

pub mod palette;

pub use palette::{CgbPalette, DmgPalette};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Scanline timing in single-speed cycles
const SCANLINE_CYCLES: i32 = 456;
const MODE2_BOUND: i32 = SCANLINE_CYCLES - 80;
const MODE3_BOUND: i32 = MODE2_BOUND - 172;
const LAST_LINE: u8 = 153;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Internal memory sizes
const VRAM_BANK_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;

// VRAM layout constants, relative to 0x8000
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_UNSIGNED: usize = 0x0000;
const TILE_DATA_SIGNED: usize = 0x0800;

// LCD modes stored in STAT bits 0-1
pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

const WHITE: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// A full 160x144 RGB frame, row-major.
pub type Frame = [[u8; 3]; SCREEN_WIDTH * SCREEN_HEIGHT];

fn blank_frame() -> Box<Frame> {
    Box::new([WHITE; SCREEN_WIDTH * SCREEN_HEIGHT])
}

#[derive(Copy, Clone, Debug)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
}

pub struct Ppu {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    pub oam: [u8; OAM_SIZE],

    cgb: bool,

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    bg_palette: CgbPalette,
    sprite_palette: CgbPalette,
    dmg_palette: DmgPalette,

    /// Cycles left in the current scanline.
    scanline_counter: i32,
    coincidence: bool,
    screen_cleared: bool,

    screen: Box<Frame>,
    prepared: Box<Frame>,
    /// Background colour index of each pixel on the current line.
    tile_scanline: [u8; SCREEN_WIDTH],
    /// CGB BG-to-OAM priority attribute of each pixel on the current line.
    bg_priority: [bool; SCREEN_WIDTH],

    pub hide_background: bool,
    pub hide_sprites: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new(cgb: bool) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            cgb,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            bg_palette: CgbPalette::new(),
            sprite_palette: CgbPalette::new(),
            dmg_palette: DmgPalette::default(),
            scanline_counter: SCANLINE_CYCLES,
            coincidence: false,
            screen_cleared: false,
            screen: blank_frame(),
            prepared: blank_frame(),
            tile_scanline: [0; SCREEN_WIDTH],
            bg_priority: [false; SCREEN_WIDTH],
            hide_background: false,
            hide_sprites: false,
            frame_counter: 0,
        }
    }

    /// Register values left behind by the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.stat = 0x85;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn dmg_palette(&self) -> DmgPalette {
        self.dmg_palette
    }

    pub fn set_dmg_palette(&mut self, palette: DmgPalette) {
        self.dmg_palette = palette;
    }

    pub fn cycle_palette(&mut self) -> DmgPalette {
        self.dmg_palette = self.dmg_palette.next();
        self.dmg_palette
    }

    /// The last completed frame. Stable until the next V-blank.
    pub fn prepared_frame(&self) -> &Frame {
        &self.prepared
    }

    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> u8 {
        self.stat & 0x03
    }

    pub fn lcd_enabled(&self) -> bool {
        bits::test(self.lcdc, 7)
    }

    pub fn bg_palette(&self) -> &CgbPalette {
        &self.bg_palette
    }

    pub fn sprite_palette(&self) -> &CgbPalette {
        &self.sprite_palette
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[self.vram_bank][usize::from(addr) & (VRAM_BANK_SIZE - 1)]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        self.vram[self.vram_bank][usize::from(addr) & (VRAM_BANK_SIZE - 1)] = val;
    }

    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam
            .get(usize::from(addr.wrapping_sub(0xFE00)))
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        if let Some(slot) = self.oam.get_mut(usize::from(addr.wrapping_sub(0xFE00))) {
            *slot = val;
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => self.stat | 0x80,
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF4F if self.cgb => 0xFE | self.vram_bank as u8,
            0xFF68 if self.cgb => self.bg_palette.read_index(),
            0xFF69 if self.cgb => self.bg_palette.read_data(),
            0xFF6A if self.cgb => self.sprite_palette.read_index(),
            0xFF6B if self.cgb => self.sprite_palette.read_data(),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => self.lcdc = val,
            // Mode and coincidence bits are read-only.
            0xFF41 => self.stat = (self.stat & 0x07) | (val & 0x78),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => self.ly = 0,
            0xFF45 => self.lyc = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF4F if self.cgb => self.vram_bank = usize::from(val & 0x01),
            0xFF68 if self.cgb => self.bg_palette.write_index(val),
            0xFF69 if self.cgb => self.bg_palette.write_data(val),
            0xFF6A if self.cgb => self.sprite_palette.write_index(val),
            0xFF6B if self.cgb => self.sprite_palette.write_data(val),
            _ => {}
        }
    }

    /// Advance the LCD by `cycles` CPU cycles at the given CPU `speed`
    /// multiplier. Returns true when the PPU entered H-blank during this
    /// call, which is when an H-blank DMA block should run.
    pub fn update(&mut self, cycles: u32, speed: u32, if_reg: &mut u8) -> bool {
        let speed = speed.max(1) as i32;

        if !self.lcd_enabled() {
            self.lcd_off(speed);
            return false;
        }
        self.screen_cleared = false;

        self.scanline_counter -= cycles as i32;
        if self.scanline_counter <= 0 {
            self.ly = self.ly.wrapping_add(1);
            if self.ly > LAST_LINE {
                self.ly = 0;
            }
            self.scanline_counter += SCANLINE_CYCLES * speed;
            if usize::from(self.ly) == SCREEN_HEIGHT {
                self.finish_frame();
                interrupts::request(if_reg, Interrupt::VBlank);
            }
        }

        self.update_status(speed, if_reg)
    }

    fn lcd_off(&mut self, speed: i32) {
        if !self.screen_cleared {
            self.screen.fill(WHITE);
            self.prepared.copy_from_slice(&self.screen[..]);
            self.screen_cleared = true;
        }
        self.scanline_counter = SCANLINE_CYCLES * speed;
        self.ly = 0;
        self.stat &= !0x03;
    }

    fn finish_frame(&mut self) {
        self.prepared.copy_from_slice(&self.screen[..]);
        self.screen.fill(WHITE);
        self.frame_counter = self.frame_counter.wrapping_add(1);
    }

    fn update_status(&mut self, speed: i32, if_reg: &mut u8) -> bool {
        let current_mode = self.stat & 0x03;

        let (mode, irq_enabled) = if usize::from(self.ly) >= SCREEN_HEIGHT {
            (MODE_VBLANK, bits::test(self.stat, 4))
        } else if self.scanline_counter > MODE2_BOUND * speed {
            (MODE_OAM, bits::test(self.stat, 5))
        } else if self.scanline_counter > MODE3_BOUND * speed {
            (MODE_TRANSFER, false)
        } else {
            (MODE_HBLANK, bits::test(self.stat, 3))
        };

        let changed = mode != current_mode;
        self.stat = (self.stat & !0x03) | mode;

        if changed && mode == MODE_TRANSFER {
            self.draw_scanline();
        }
        if changed && irq_enabled {
            interrupts::request(if_reg, Interrupt::LcdStat);
        }

        let coincidence = self.ly == self.lyc;
        if coincidence {
            self.stat = bits::set(self.stat, 2);
            if !self.coincidence && bits::test(self.stat, 6) {
                interrupts::request(if_reg, Interrupt::LcdStat);
            }
        } else {
            self.stat = bits::reset(self.stat, 2);
        }
        self.coincidence = coincidence;

        changed && mode == MODE_HBLANK
    }

    fn draw_scanline(&mut self) {
        self.tile_scanline = [0; SCREEN_WIDTH];
        self.bg_priority = [false; SCREEN_WIDTH];

        if (self.cgb || bits::test(self.lcdc, 0)) && !self.hide_background {
            self.render_tiles();
        }
        if bits::test(self.lcdc, 1) && !self.hide_sprites {
            if self.cgb {
                self.render_sprites_cgb();
            } else {
                self.render_sprites_dmg();
            }
        }
    }

    fn dmg_color(&self, palette: u8, num: u8) -> [u8; 3] {
        let shade = (palette >> (num * 2)) & 0x03;
        self.dmg_palette.colors()[usize::from(shade)]
    }

    fn set_pixel(&mut self, x: usize, color: [u8; 3]) {
        self.screen[usize::from(self.ly) * SCREEN_WIDTH + x] = color;
    }

    fn render_tiles(&mut self) {
        let ly = self.ly;
        let window_on_line = bits::test(self.lcdc, 5) && self.wy <= ly;
        let window_start = i16::from(self.wx) - 7;
        let unsigned_tiles = bits::test(self.lcdc, 4);
        let bg_map = if bits::test(self.lcdc, 3) { BG_MAP_1_BASE } else { BG_MAP_0_BASE };
        let window_map = if bits::test(self.lcdc, 6) { BG_MAP_1_BASE } else { BG_MAP_0_BASE };

        for pixel in 0..SCREEN_WIDTH {
            let in_window = window_on_line && pixel as i16 >= window_start;
            let (map, x_pos, y_pos) = if in_window {
                (window_map, (pixel as i16 - window_start) as u8, ly - self.wy)
            } else {
                (bg_map, (pixel as u8).wrapping_add(self.scx), self.scy.wrapping_add(ly))
            };

            let map_addr = map + usize::from(y_pos / 8) * 32 + usize::from(x_pos / 8);
            let tile_num = self.vram[0][map_addr];
            let attr = if self.cgb { self.vram[1][map_addr] } else { 0 };

            let tile_addr = if unsigned_tiles {
                TILE_DATA_UNSIGNED + usize::from(tile_num) * 16
            } else {
                TILE_DATA_SIGNED + ((tile_num as i8 as i16 + 128) as usize) * 16
            };
            let bank = usize::from(bits::test(attr, 3));

            let mut row = usize::from(y_pos % 8);
            if bits::test(attr, 6) {
                row = 7 - row;
            }
            let data1 = self.vram[bank][tile_addr + row * 2];
            let data2 = self.vram[bank][tile_addr + row * 2 + 1];

            let mut colour_bit = 7 - (x_pos % 8);
            if bits::test(attr, 5) {
                colour_bit = x_pos % 8;
            }
            let colour_num = (bits::val(data2, colour_bit) << 1) | bits::val(data1, colour_bit);

            let color = if self.cgb {
                self.bg_palette.color(attr & 0x07, colour_num)
            } else {
                self.dmg_color(self.bgp, colour_num)
            };
            self.set_pixel(pixel, color);
            self.tile_scanline[pixel] = colour_num;
            self.bg_priority[pixel] = bits::test(attr, 7);
        }
    }

    fn sprite_height(&self) -> i16 {
        if bits::test(self.lcdc, 2) { 16 } else { 8 }
    }

    /// Sprites intersecting the current line, in OAM order, capped at the
    /// hardware limit of ten.
    fn sprites_on_line(&self) -> Vec<Sprite> {
        let height = self.sprite_height();
        let ly = i16::from(self.ly);
        (0..TOTAL_SPRITES)
            .map(|i| {
                let entry = &self.oam[i * 4..i * 4 + 4];
                Sprite {
                    y: i16::from(entry[0]) - 16,
                    x: i16::from(entry[1]) - 8,
                    tile: entry[2],
                    flags: entry[3],
                }
            })
            .filter(|s| ly >= s.y && ly < s.y + height)
            .take(MAX_SPRITES_PER_LINE)
            .collect()
    }

    /// Tile row bytes of `sprite` for the current line.
    fn sprite_row(&self, sprite: &Sprite) -> (u8, u8) {
        let height = self.sprite_height();
        let mut line = i16::from(self.ly) - sprite.y;
        if bits::test(sprite.flags, 6) {
            line = height - line - 1;
        }
        let tile = if height == 16 { sprite.tile & 0xFE } else { sprite.tile };
        let bank = if self.cgb { usize::from(bits::test(sprite.flags, 3)) } else { 0 };
        let addr = usize::from(tile) * 16 + line as usize * 2;
        (self.vram[bank][addr], self.vram[bank][addr + 1])
    }

    /// Colour index of each on-screen pixel covered by `sprite`.
    fn sprite_pixels(&self, sprite: &Sprite) -> impl Iterator<Item = (usize, u8)> + use<> {
        let (data1, data2) = self.sprite_row(sprite);
        let x_flip = bits::test(sprite.flags, 5);
        let x = sprite.x;
        (0..8u8).filter_map(move |offset| {
            let pixel = x + i16::from(offset);
            if !(0..SCREEN_WIDTH as i16).contains(&pixel) {
                return None;
            }
            let colour_bit = if x_flip { offset } else { 7 - offset };
            let colour_num = (bits::val(data2, colour_bit) << 1) | bits::val(data1, colour_bit);
            Some((pixel as usize, colour_num))
        })
    }

    /// Draws the sprite pixel unless the background covers it.
    fn set_sprite_pixel(&mut self, x: usize, above_bg: bool, color: [u8; 3]) {
        let bg_master = !self.cgb || bits::test(self.lcdc, 0);
        let bg_wins = bg_master && (!above_bg || self.bg_priority[x]);
        if !bg_wins || self.tile_scanline[x] == 0 {
            self.set_pixel(x, color);
        }
    }

    /// DMG priority: the sprite with the smaller X wins an overlapping pixel,
    /// earlier OAM entries break ties.
    fn render_sprites_dmg(&mut self) {
        let mut min_x = [i16::MAX; SCREEN_WIDTH];
        for sprite in self.sprites_on_line() {
            let palette = if bits::test(sprite.flags, 4) { self.obp1 } else { self.obp0 };
            let above_bg = !bits::test(sprite.flags, 7);
            for (pixel, colour_num) in self.sprite_pixels(&sprite) {
                if colour_num == 0 || min_x[pixel] <= sprite.x {
                    continue;
                }
                min_x[pixel] = sprite.x;
                let color = self.dmg_color(palette, colour_num);
                self.set_sprite_pixel(pixel, above_bg, color);
            }
        }
    }

    /// CGB priority: OAM order alone decides overlapping pixels.
    fn render_sprites_cgb(&mut self) {
        let mut drawn = [false; SCREEN_WIDTH];
        for sprite in self.sprites_on_line() {
            let above_bg = !bits::test(sprite.flags, 7);
            for (pixel, colour_num) in self.sprite_pixels(&sprite) {
                if colour_num == 0 || drawn[pixel] {
                    continue;
                }
                drawn[pixel] = true;
                let color = self.sprite_palette.color(sprite.flags & 0x07, colour_num);
                self.set_sprite_pixel(pixel, above_bg, color);
            }
        }
    }

    /// The 32x32 tile indices of the background map at 0x9800 as hex text.
    pub fn bg_map_string(&self) -> String {
        let mut out = String::with_capacity(32 * (32 * 3 + 1));
        for row in self.vram[0][BG_MAP_0_BASE..BG_MAP_1_BASE].chunks(32) {
            for (i, tile) in row.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{tile:02X}");
            }
            out.push('\n');
        }
        out
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(false)
    }
}
