pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

/// A 16-bit register pair with independent high/low byte views.
///
/// `mask` is non-zero only for AF, where the low nibble of F does not exist
/// in hardware and always reads back as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Register {
    value: u16,
    mask: u16,
}

impl Register {
    pub const fn new(value: u16) -> Self {
        Self { value, mask: 0 }
    }

    pub const fn with_mask(value: u16, mask: u16) -> Self {
        Self {
            value: value & mask,
            mask,
        }
    }

    #[inline]
    pub fn hi(&self) -> u8 {
        (self.value >> 8) as u8
    }

    #[inline]
    pub fn lo(&self) -> u8 {
        self.value as u8
    }

    #[inline]
    pub fn get(&self) -> u16 {
        self.value
    }

    #[inline]
    pub fn set_hi(&mut self, val: u8) {
        self.value = (u16::from(val) << 8) | (self.value & 0x00FF);
        self.apply_mask();
    }

    #[inline]
    pub fn set_lo(&mut self, val: u8) {
        self.value = u16::from(val) | (self.value & 0xFF00);
        self.apply_mask();
    }

    #[inline]
    pub fn set(&mut self, val: u16) {
        self.value = val;
        self.apply_mask();
    }

    #[inline]
    fn apply_mask(&mut self) {
        if self.mask != 0 {
            self.value &= self.mask;
        }
    }
}

/// The SM83 register file. PC is not part of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub af: Register,
    pub bc: Register,
    pub de: Register,
    pub hl: Register,
    pub sp: Register,
    pub pc: u16,
}

impl Registers {
    const AF_MASK: u16 = 0xFFF0;

    /// Register contents left behind by the boot ROM.
    pub fn post_boot(cgb: bool) -> Self {
        Self {
            af: Register::with_mask(if cgb { 0x11B0 } else { 0x01B0 }, Self::AF_MASK),
            bc: Register::new(0x0013),
            de: Register::new(0x00D8),
            hl: Register::new(0x014D),
            sp: Register::new(0xFFFE),
            pc: 0x0100,
        }
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.af.hi()
    }

    #[inline]
    pub fn set_a(&mut self, val: u8) {
        self.af.set_hi(val);
    }

    #[inline]
    pub fn f(&self) -> u8 {
        self.af.lo()
    }

    #[inline]
    pub fn flag(&self, flag: u8) -> bool {
        self.af.lo() & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u8, on: bool) {
        let f = self.af.lo();
        self.af.set_lo(if on { f | flag } else { f & !flag });
    }

    /// Sets all four flags at once.
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        let mut f = 0;
        if z {
            f |= FLAG_Z;
        }
        if n {
            f |= FLAG_N;
        }
        if h {
            f |= FLAG_H;
        }
        if c {
            f |= FLAG_C;
        }
        self.af.set_lo(f);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::post_boot(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_halves_are_independent() {
        for (x, y) in [(0x00u8, 0xFFu8), (0x12, 0x34), (0xFF, 0x00), (0xA5, 0x5A)] {
            let mut reg = Register::new(0);
            reg.set_hi(x);
            reg.set_lo(y);
            assert_eq!(reg.hi(), x);
            assert_eq!(reg.lo(), y);
            assert_eq!(reg.get(), (u16::from(x) << 8) | u16::from(y));

            reg.set_hi(y);
            assert_eq!(reg.lo(), y, "writing the high byte must keep the low byte");
        }
    }

    #[test]
    fn af_low_nibble_always_reads_zero() {
        let mut regs = Registers::post_boot(false);
        regs.af.set_lo(0xFF);
        assert_eq!(regs.af.lo(), 0xF0);
        regs.af.set(0x12FF);
        assert_eq!(regs.af.get(), 0x12F0);
        regs.af.set_hi(0x34);
        assert_eq!(regs.af.get(), 0x34F0);
    }

    #[test]
    fn post_boot_values() {
        let dmg = Registers::post_boot(false);
        assert_eq!(dmg.af.get(), 0x01B0);
        assert_eq!(dmg.bc.get(), 0x0013);
        assert_eq!(dmg.de.get(), 0x00D8);
        assert_eq!(dmg.hl.get(), 0x014D);
        assert_eq!(dmg.sp.get(), 0xFFFE);
        assert_eq!(dmg.pc, 0x0100);
        assert_eq!(Registers::post_boot(true).a(), 0x11);
    }

    #[test]
    fn flag_helpers_touch_only_their_bit() {
        let mut regs = Registers::post_boot(false);
        regs.set_flags(false, false, false, false);
        regs.set_flag(FLAG_H, true);
        assert_eq!(regs.f(), FLAG_H);
        regs.set_flag(FLAG_C, true);
        regs.set_flag(FLAG_H, false);
        assert_eq!(regs.f(), FLAG_C);
        assert!(regs.flag(FLAG_C));
        assert!(!regs.flag(FLAG_Z));
    }
}
