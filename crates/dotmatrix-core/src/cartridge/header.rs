use crate::error::LoadError;

pub const HEADER_END: usize = 0x150;

const TITLE_START: usize = 0x134;
const TITLE_END: usize = 0x142;
const CGB_FLAG: usize = 0x143;
const CART_TYPE: usize = 0x147;
const ROM_SIZE: usize = 0x148;
const RAM_SIZE: usize = 0x149;

/// Hardware a cartridge declares it can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartMode(u8);

impl CartMode {
    pub const DMG: CartMode = CartMode(0b01);
    pub const CGB: CartMode = CartMode(0b10);
    pub const DUAL: CartMode = CartMode(0b11);

    pub fn contains(self, other: CartMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn supports_cgb(self) -> bool {
        self.contains(Self::CGB)
    }

    pub fn supports_dmg(self) -> bool {
        self.contains(Self::DMG)
    }
}

/// Parsed cartridge header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub mode: CartMode,
    pub cart_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
}

impl Header {
    pub fn parse(rom: &[u8]) -> Result<Self, LoadError> {
        if rom.len() < HEADER_END {
            return Err(LoadError::RomTooSmall(rom.len()));
        }

        let title: String = rom[TITLE_START..TITLE_END]
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();

        let mode = match rom[CGB_FLAG] {
            0x80 => CartMode::DUAL,
            0xC0 => CartMode::CGB,
            _ => CartMode::DMG,
        };

        Ok(Self {
            title: title.trim().to_string(),
            mode,
            cart_type: rom[CART_TYPE],
            rom_size_code: rom[ROM_SIZE],
            ram_size_code: rom[RAM_SIZE],
        })
    }

    /// External RAM size in bytes declared by the header.
    pub fn ram_size(&self) -> usize {
        match self.ram_size_code {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        }
    }

    /// ROM size in bytes declared by the header.
    pub fn rom_size(&self) -> usize {
        match self.rom_size_code {
            code @ 0x00..=0x08 => 0x8000 << code,
            _ => 0x8000,
        }
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x17 | 0x1B | 0x1E | 0xFF
        )
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.cart_type, 0x0F | 0x10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_title(title: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[TITLE_START..TITLE_START + title.len()].copy_from_slice(title);
        rom
    }

    #[test]
    fn title_is_nul_trimmed() {
        let header = Header::parse(&rom_with_title(b"TETRIS\0\0")).unwrap();
        assert_eq!(header.title, "TETRIS");
    }

    #[test]
    fn cgb_flag_selects_mode() {
        let mut rom = rom_with_title(b"X");
        assert_eq!(Header::parse(&rom).unwrap().mode, CartMode::DMG);
        rom[CGB_FLAG] = 0x80;
        let mode = Header::parse(&rom).unwrap().mode;
        assert!(mode.supports_cgb() && mode.supports_dmg());
        rom[CGB_FLAG] = 0xC0;
        let mode = Header::parse(&rom).unwrap().mode;
        assert!(mode.supports_cgb() && !mode.supports_dmg());
    }

    #[test]
    fn short_image_is_rejected() {
        assert!(matches!(
            Header::parse(&[0u8; 0x100]),
            Err(LoadError::RomTooSmall(0x100))
        ));
    }

    #[test]
    fn size_codes() {
        let mut rom = rom_with_title(b"X");
        rom[ROM_SIZE] = 0x02;
        rom[RAM_SIZE] = 0x03;
        let header = Header::parse(&rom).unwrap();
        assert_eq!(header.rom_size(), 0x20000);
        assert_eq!(header.ram_size(), 0x8000);
    }
}
