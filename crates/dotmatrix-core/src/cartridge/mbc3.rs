use std::time::SystemTime;

use log::warn;

use super::rtc::{Rtc, TRAILER_LEN};
use super::{BankingController, ram_index, rom_byte};

#[derive(Debug)]
pub struct Mbc3 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u8,
    /// 0x00-0x03 select a RAM bank, 0x08-0x0C an RTC register.
    ram_select: u8,
    ram_enabled: bool,
    rtc: Option<Rtc>,
    last_latch_write: Option<u8>,
}

impl Mbc3 {
    pub fn new(rom: Vec<u8>, ram_size: usize, with_rtc: bool) -> Self {
        Self {
            rom,
            ram: vec![0; ram_size],
            rom_bank: 1,
            ram_select: 0,
            ram_enabled: false,
            rtc: with_rtc.then(|| Rtc::new(SystemTime::now())),
            last_latch_write: None,
        }
    }

    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    /// Advances the clock; returns true when the persisted clock state changed.
    pub fn step_rtc(&mut self, cycles: u32) -> bool {
        self.rtc.as_mut().is_some_and(|rtc| rtc.step(cycles))
    }
}

impl BankingController for Mbc3 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => rom_byte(&self.rom, 0, addr),
            0x4000..=0x7FFF => rom_byte(&self.rom, usize::from(self.rom_bank), addr),
            0xA000..=0xBFFF if self.ram_enabled => match self.ram_select {
                0x00..=0x03 => ram_index(self.ram.len(), usize::from(self.ram_select), addr)
                    .and_then(|i| self.ram.get(i).copied())
                    .unwrap_or(0xFF),
                reg @ 0x08..=0x0C => self.rtc.as_ref().map_or(0xFF, |rtc| rtc.read(reg)),
                _ => 0xFF,
            },
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
                self.rom_bank = val & 0x7F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_select = val,
            0x6000..=0x7FFF => {
                if self.last_latch_write == Some(0x00) && val == 0x01 {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.latch();
                    }
                }
                self.last_latch_write = Some(val);
            }
            _ => {}
        }
    }

    fn write_ram(&mut self, addr: u16, val: u8) -> bool {
        if !self.ram_enabled {
            return false;
        }
        match self.ram_select {
            0x00..=0x03 => {
                match ram_index(self.ram.len(), usize::from(self.ram_select), addr)
                    .and_then(|i| self.ram.get_mut(i))
                {
                    Some(slot) => {
                        *slot = val;
                        true
                    }
                    None => false,
                }
            }
            reg @ 0x08..=0x0C => match self.rtc.as_mut() {
                Some(rtc) => {
                    rtc.write(reg, val);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn save_data(&self) -> Vec<u8> {
        let mut data = self.ram.clone();
        if let Some(rtc) = &self.rtc {
            data.extend_from_slice(&rtc.serialize(SystemTime::now()));
        }
        data
    }

    fn load_save_data(&mut self, data: &[u8]) {
        let n = data.len().min(self.ram.len());
        self.ram[..n].copy_from_slice(&data[..n]);

        let Some(rtc) = self.rtc.as_mut() else {
            return;
        };
        let trailer = &data[n..];
        if trailer.is_empty() {
            return;
        }
        if trailer.len() >= TRAILER_LEN && rtc.deserialize(trailer) {
            rtc.sync_wall(SystemTime::now());
        } else {
            warn!("Ignoring unrecognised RTC data in save file ({} bytes)", trailer.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rtc::RTC_CYCLES_PER_SECOND;
    use super::*;

    #[test]
    fn rom_bank_uses_seven_bits() {
        let mut rom = vec![0u8; 128 * 0x4000];
        rom[0x7F * 0x4000] = 0x7F;
        let mut mbc = Mbc3::new(rom, 0, false);
        mbc.write_rom(0x2000, 0xFF);
        assert_eq!(mbc.rom_bank(), 0x7F);
        assert_eq!(mbc.read(0x4000), 0x7F);
        mbc.write_rom(0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
    }

    #[test]
    fn rtc_select_routes_away_from_ram() {
        let mut mbc = Mbc3::new(vec![0u8; 0x8000], 0x8000, true);
        mbc.write_rom(0x0000, 0x0A);
        mbc.write_ram(0xA000, 0x11);

        mbc.write_rom(0x4000, 0x08);
        mbc.write_ram(0xA000, 42);
        assert_eq!(mbc.read(0xA000), 42);

        mbc.write_rom(0x4000, 0x00);
        assert_eq!(mbc.read(0xA000), 0x11);
    }

    #[test]
    fn latch_requires_zero_then_one() {
        let mut mbc = Mbc3::new(vec![0u8; 0x8000], 0, true);
        mbc.write_rom(0x0000, 0x0A);
        mbc.write_rom(0x4000, 0x08);

        mbc.step_rtc(RTC_CYCLES_PER_SECOND * 3);
        mbc.write_rom(0x6000, 0x01);
        assert_eq!(mbc.read(0xA000), 0);

        mbc.write_rom(0x6000, 0x00);
        mbc.write_rom(0x6000, 0x01);
        assert_eq!(mbc.read(0xA000), 3);
    }

    #[test]
    fn invalid_select_reads_open_bus() {
        let mut mbc = Mbc3::new(vec![0u8; 0x8000], 0x2000, false);
        mbc.write_rom(0x0000, 0x0A);
        mbc.write_rom(0x4000, 0x08);
        assert_eq!(mbc.read(0xA000), 0xFF);
        mbc.write_rom(0x4000, 0x05);
        mbc.write_ram(0xA000, 0x12);
        assert_eq!(mbc.read(0xA000), 0xFF);
    }

    #[test]
    fn save_data_carries_rtc_trailer() {
        let mut mbc = Mbc3::new(vec![0u8; 0x8000], 0x2000, true);
        mbc.write_rom(0x0000, 0x0A);
        mbc.write_rom(0x4000, 0x0C);
        mbc.write_ram(0xA000, 0x40);
        mbc.write_rom(0x4000, 0x09);
        mbc.write_ram(0xA000, 7);

        let data = mbc.save_data();
        assert_eq!(data.len(), 0x2000 + TRAILER_LEN);

        let mut restored = Mbc3::new(vec![0u8; 0x8000], 0x2000, true);
        restored.load_save_data(&data);
        let regs = restored.rtc().map(|rtc| rtc.registers()).unwrap();
        assert_eq!(regs.minutes, 7);
        assert!(regs.halt);
    }
}
