use std::fmt;
use std::str::FromStr;

/// 5-bit CGB colour channel to 8-bit, matching the LCD's response curve
/// more closely than a plain shift.
const CHANNEL_5_TO_8: [u8; 32] = [
    0x00, 0x08, 0x10, 0x18, 0x20, 0x29, 0x31, 0x39, 0x41, 0x4A, 0x52, 0x5A, 0x62, 0x6A, 0x73, 0x7B,
    0x83, 0x8B, 0x94, 0x9C, 0xA4, 0xAC, 0xB4, 0xBD, 0xC5, 0xCD, 0xD5, 0xDE, 0xE6, 0xEE, 0xF6, 0xFF,
];

const PAL_RAM_SIZE: usize = 0x40;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_UNUSED_BIT: u8 = 0x40;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

/// Colour set used to render the four DMG shades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DmgPalette {
    Greyscale,
    Original,
    #[default]
    Bgb,
}

impl DmgPalette {
    pub const ALL: [DmgPalette; 3] = [DmgPalette::Greyscale, DmgPalette::Original, DmgPalette::Bgb];

    /// RGB colours for shades 0 (lightest) to 3 (darkest).
    pub fn colors(self) -> [[u8; 3]; 4] {
        match self {
            DmgPalette::Greyscale => [
                [0xFF, 0xFF, 0xFF],
                [0xCC, 0xCC, 0xCC],
                [0x77, 0x77, 0x77],
                [0x00, 0x00, 0x00],
            ],
            DmgPalette::Original => [
                [0x9B, 0xBC, 0x0F],
                [0x8B, 0xAC, 0x0F],
                [0x30, 0x62, 0x30],
                [0x0F, 0x38, 0x0F],
            ],
            DmgPalette::Bgb => [
                [0xE0, 0xF8, 0xD0],
                [0x88, 0xC0, 0x70],
                [0x34, 0x68, 0x56],
                [0x08, 0x18, 0x20],
            ],
        }
    }

    pub fn next(self) -> Self {
        match self {
            DmgPalette::Greyscale => DmgPalette::Original,
            DmgPalette::Original => DmgPalette::Bgb,
            DmgPalette::Bgb => DmgPalette::Greyscale,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DmgPalette::Greyscale => "greyscale",
            DmgPalette::Original => "original",
            DmgPalette::Bgb => "bgb",
        }
    }
}

impl fmt::Display for DmgPalette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DmgPalette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown palette '{s}' (expected greyscale, original or bgb)"))
    }
}

/// One of the two CGB palette memories (BCPS/BCPD or OCPS/OCPD): eight
/// palettes of four little-endian RGB555 colours.
#[derive(Debug, Clone)]
pub struct CgbPalette {
    data: [u8; PAL_RAM_SIZE],
    index: u8,
}

impl CgbPalette {
    pub fn new() -> Self {
        Self {
            data: [0xFF; PAL_RAM_SIZE],
            index: PAL_UNUSED_BIT,
        }
    }

    pub fn read_index(&self) -> u8 {
        self.index
    }

    pub fn write_index(&mut self, val: u8) {
        self.index = (val & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK)) | PAL_UNUSED_BIT;
    }

    pub fn read_data(&self) -> u8 {
        self.data[(self.index & PAL_INDEX_MASK) as usize]
    }

    pub fn write_data(&mut self, val: u8) {
        self.data[(self.index & PAL_INDEX_MASK) as usize] = val;
        if self.index & PAL_AUTO_INCREMENT_BIT != 0 {
            let next = (self.index & PAL_INDEX_MASK).wrapping_add(1) & PAL_INDEX_MASK;
            self.index = PAL_AUTO_INCREMENT_BIT | PAL_UNUSED_BIT | next;
        }
    }

    /// RGB colour `num` (0-3) of palette `palette` (0-7).
    pub fn color(&self, palette: u8, num: u8) -> [u8; 3] {
        let off = (usize::from(palette & 7) * 8) + usize::from(num & 3) * 2;
        let raw = u16::from_le_bytes([self.data[off], self.data[off + 1]]);
        let channel = |shift: u16| CHANNEL_5_TO_8[usize::from((raw >> shift) & 0x1F)];
        [channel(0), channel(5), channel(10)]
    }
}

impl Default for CgbPalette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_increment_wraps_within_64_bytes() {
        let mut pal = CgbPalette::new();
        pal.write_index(0x80 | 0x3F);
        pal.write_data(0x12);
        assert_eq!(pal.read_index() & 0x3F, 0);
        pal.write_data(0x34);
        assert_eq!(pal.read_index(), 0xC1);
    }

    #[test]
    fn index_without_increment_stays_put() {
        let mut pal = CgbPalette::new();
        pal.write_index(0x05);
        pal.write_data(0xAA);
        pal.write_data(0xBB);
        assert_eq!(pal.read_data(), 0xBB);
        assert_eq!(pal.read_index(), 0x45);
    }

    #[test]
    fn rgb555_decodes_through_table() {
        let mut pal = CgbPalette::new();
        // palette 1, colour 2 = red 31, green 0, blue 16
        pal.write_index(0x80 | (8 + 4));
        let raw: u16 = 31 | (16 << 10);
        let [lo, hi] = raw.to_le_bytes();
        pal.write_data(lo);
        pal.write_data(hi);
        assert_eq!(pal.color(1, 2), [0xFF, 0x00, 0x83]);
        assert_eq!(pal.color(0, 0), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn palette_names_parse_and_cycle() {
        assert_eq!("BGB".parse::<DmgPalette>(), Ok(DmgPalette::Bgb));
        assert!("sepia".parse::<DmgPalette>().is_err());
        let mut p = DmgPalette::default();
        for _ in 0..3 {
            p = p.next();
        }
        assert_eq!(p, DmgPalette::Bgb);
    }
}
