use super::{BankingController, ram_index, rom_byte};

/// MBC5: 9-bit ROM bank (bank 0 selectable) and up to 16 RAM banks.
#[derive(Debug)]
pub struct Mbc5 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u16,
    ram_bank: u8,
    ram_enabled: bool,
}

impl Mbc5 {
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        Self {
            rom,
            ram: vec![0; ram_size],
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
        }
    }

    pub fn rom_bank(&self) -> u16 {
        self.rom_bank
    }
}

impl BankingController for Mbc5 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => rom_byte(&self.rom, 0, addr),
            0x4000..=0x7FFF => rom_byte(&self.rom, usize::from(self.rom_bank), addr),
            0xA000..=0xBFFF if self.ram_enabled => {
                ram_index(self.ram.len(), usize::from(self.ram_bank), addr)
                    .and_then(|i| self.ram.get(i).copied())
                    .unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write_rom(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => match val & 0x0F {
                0x0A => self.ram_enabled = true,
                0x00 => self.ram_enabled = false,
                _ => {}
            },
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | u16::from(val),
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x0FF) | (u16::from(val & 0x01) << 8);
            }
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            _ => {}
        }
    }

    fn write_ram(&mut self, addr: u16, val: u8) -> bool {
        if !self.ram_enabled {
            return false;
        }
        match ram_index(self.ram.len(), usize::from(self.ram_bank), addr).and_then(|i| self.ram.get_mut(i)) {
            Some(slot) => {
                *slot = val;
                true
            }
            None => false,
        }
    }

    fn save_data(&self) -> Vec<u8> {
        self.ram.clone()
    }

    fn load_save_data(&mut self, data: &[u8]) {
        let n = data.len().min(self.ram.len());
        self.ram[..n].copy_from_slice(&data[..n]);
    }
}
