use super::{BankingController, rom_byte};

const MBC2_RAM_SIZE: usize = 0x200;

/// MBC2: 4-bit ROM bank register and 512 half-byte cells of built-in RAM.
#[derive(Debug)]
pub struct Mbc2 {
    rom: Vec<u8>,
    ram: [u8; MBC2_RAM_SIZE],
    rom_bank: u8,
    ram_enabled: bool,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            ram: [0; MBC2_RAM_SIZE],
            rom_bank: 1,
            ram_enabled: false,
        }
    }

    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }
}

impl BankingController for Mbc2 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => rom_byte(&self.rom, 0, addr),
            0x4000..=0x7FFF => rom_byte(&self.rom, usize::from(self.rom_bank), addr),
            // Only the low nibble exists; the upper bits float high.
            0xA000..=0xBFFF if self.ram_enabled => {
                self.ram[usize::from(addr) & (MBC2_RAM_SIZE - 1)] | 0xF0
            }
            _ => 0xFF,
        }
    }

    fn write_rom(&mut self, addr: u16, val: u8) {
        if addr >= 0x4000 {
            return;
        }
        // Address bit 8 selects between the RAM enable and ROM bank registers.
        if addr & 0x0100 == 0 {
            self.ram_enabled = val & 0x0F == 0x0A;
        } else {
            self.rom_bank = val & 0x0F;
            if self.rom_bank == 0 {
                self.rom_bank = 1;
            }
        }
    }

    fn write_ram(&mut self, addr: u16, val: u8) -> bool {
        if self.ram_enabled {
            self.ram[usize::from(addr) & (MBC2_RAM_SIZE - 1)] = val & 0x0F;
        }
        self.ram_enabled
    }

    fn save_data(&self) -> Vec<u8> {
        self.ram.to_vec()
    }

    fn load_save_data(&mut self, data: &[u8]) {
        for (dst, src) in self.ram.iter_mut().zip(data) {
            *dst = src & 0x0F;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bit_eight_selects_register() {
        let mut rom = vec![0u8; 16 * 0x4000];
        rom[3 * 0x4000] = 0x33;
        let mut mbc = Mbc2::new(rom);

        // Bit 8 clear: RAM enable, bank untouched.
        mbc.write_rom(0x0000, 0x03);
        assert_eq!(mbc.rom_bank(), 1);

        mbc.write_rom(0x2100, 0x03);
        assert_eq!(mbc.rom_bank(), 3);
        assert_eq!(mbc.read(0x4000), 0x33);

        mbc.write_rom(0x2100, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
    }

    #[test]
    fn ram_stores_nibbles_and_mirrors() {
        let mut mbc = Mbc2::new(vec![0u8; 0x8000]);
        mbc.write_rom(0x0000, 0x0A);
        mbc.write_ram(0xA000, 0xAB);
        assert_eq!(mbc.read(0xA000), 0xFB);
        assert_eq!(mbc.read(0xA200), 0xFB);
        assert_eq!(mbc.save_data()[0], 0x0B);
    }
}
