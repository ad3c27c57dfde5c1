use super::{BankingController, rom_byte};

/// A cartridge without a banking controller: 32 KiB of ROM mapped flat.
#[derive(Debug)]
pub struct Rom {
    rom: Vec<u8>,
}

impl Rom {
    pub fn new(rom: Vec<u8>) -> Self {
        Self { rom }
    }
}

impl BankingController for Rom {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => rom_byte(&self.rom, 0, addr),
            0x4000..=0x7FFF => rom_byte(&self.rom, 1, addr),
            _ => 0xFF,
        }
    }

    fn write_rom(&mut self, _addr: u16, _val: u8) {}

    fn write_ram(&mut self, _addr: u16, _val: u8) -> bool {
        false
    }

    fn save_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn load_save_data(&mut self, _data: &[u8]) {}
}
