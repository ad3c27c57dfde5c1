use super::{BankingController, ram_index, rom_byte};

#[derive(Debug)]
pub struct Mbc1 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    /// Combined 7-bit bank number: low 5 bits from 0x2000, upper 2 from 0x4000.
    rom_bank: u8,
    ram_bank: u8,
    ram_enabled: bool,
    /// When set, 0x4000-0x5FFF writes select the upper ROM bank bits;
    /// otherwise they select the RAM bank.
    rom_banking: bool,
}

impl Mbc1 {
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        Self {
            rom,
            ram: vec![0; ram_size],
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
            rom_banking: true,
        }
    }

    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }

    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }

    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    fn correct_zero_bank(&mut self) {
        if matches!(self.rom_bank, 0x00 | 0x20 | 0x40 | 0x60) {
            self.rom_bank += 1;
        }
    }
}

impl BankingController for Mbc1 {
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
            0x2000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x60) | (val & 0x1F);
                self.correct_zero_bank();
            }
            0x4000..=0x5FFF => {
                if self.rom_banking {
                    self.rom_bank = (self.rom_bank & 0x1F) | ((val & 0x03) << 5);
                    self.correct_zero_bank();
                } else {
                    self.ram_bank = val & 0x03;
                }
            }
            0x6000..=0x7FFF => {
                self.rom_banking = val & 0x01 == 0;
                if self.rom_banking {
                    self.ram_bank = 0;
                } else {
                    self.rom_bank &= 0x1F;
                    self.correct_zero_bank();
                }
            }
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
