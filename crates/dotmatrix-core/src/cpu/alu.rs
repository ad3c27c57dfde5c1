//! Flag-exact arithmetic, logic and shift primitives shared by the opcode
//! tables.

use super::Cpu;
use crate::{
    bits,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z},
};

impl Cpu {
    /// ADD/ADC into A.
    pub(super) fn alu_add(&mut self, val: u8, add_carry: bool) {
        let a = self.regs.a();
        let carry = u8::from(add_carry && self.regs.flag(FLAG_C));
        let total = u16::from(a) + u16::from(val) + u16::from(carry);
        let result = total as u8;
        self.regs.set_a(result);
        self.regs.set_flags(
            result == 0,
            false,
            (a & 0x0F) + (val & 0x0F) + carry > 0x0F,
            total > 0xFF,
        );
    }

    /// SUB/SBC from A.
    pub(super) fn alu_sub(&mut self, val: u8, add_carry: bool) {
        let a = self.regs.a();
        let carry = i16::from(add_carry && self.regs.flag(FLAG_C));
        let total = i16::from(a) - i16::from(val) - carry;
        let half = i16::from(a & 0x0F) - i16::from(val & 0x0F) - carry;
        let result = total as u8;
        self.regs.set_a(result);
        self.regs.set_flags(result == 0, true, half < 0, total < 0);
    }

    pub(super) fn alu_and(&mut self, val: u8) {
        let result = self.regs.a() & val;
        self.regs.set_a(result);
        self.regs.set_flags(result == 0, false, true, false);
    }

    pub(super) fn alu_or(&mut self, val: u8) {
        let result = self.regs.a() | val;
        self.regs.set_a(result);
        self.regs.set_flags(result == 0, false, false, false);
    }

    pub(super) fn alu_xor(&mut self, val: u8) {
        let result = self.regs.a() ^ val;
        self.regs.set_a(result);
        self.regs.set_flags(result == 0, false, false, false);
    }

    /// Compare: SUB without storing the result.
    pub(super) fn alu_cp(&mut self, val: u8) {
        let a = self.regs.a();
        self.regs
            .set_flags(a == val, true, (val & 0x0F) > (a & 0x0F), val > a);
    }

    /// INC r; carry is untouched.
    pub(super) fn alu_inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        let carry = self.regs.flag(FLAG_C);
        self.regs
            .set_flags(result == 0, false, bits::half_carry_add(val, 1), carry);
        result
    }

    /// DEC r; carry is untouched.
    pub(super) fn alu_dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        let carry = self.regs.flag(FLAG_C);
        self.regs
            .set_flags(result == 0, true, val & 0x0F == 0, carry);
        result
    }

    /// ADD HL,rr; Z is untouched.
    pub(super) fn alu_add16(&mut self, val: u16) {
        let hl = self.regs.hl.get();
        let total = u32::from(hl) + u32::from(val);
        let zero = self.regs.flag(FLAG_Z);
        self.regs.set_flags(
            zero,
            false,
            bits::half_carry_add16(hl, val),
            total > 0xFFFF,
        );
        self.regs.hl.set(total as u16);
    }

    /// SP plus a signed immediate, as used by ADD SP,e and LD HL,SP+e.
    /// Flags come from the unsigned low-byte addition.
    pub(super) fn alu_sp_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp.get();
        let offset = offset as i8 as u16;
        let total = sp.wrapping_add(offset);
        let tmp = sp ^ offset ^ total;
        self.regs
            .set_flags(false, false, tmp & 0x10 != 0, tmp & 0x100 != 0);
        total
    }

    /// Decimal-adjust A after a BCD add or subtract.
    pub(super) fn alu_daa(&mut self) {
        let mut a = self.regs.a();
        let mut carry = self.regs.flag(FLAG_C);
        let half = self.regs.flag(FLAG_H);
        let subtract = self.regs.flag(FLAG_N);

        if !subtract {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if half || a & 0x0F > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else if carry && half {
            a = a.wrapping_add(0x9A);
        } else if carry {
            a = a.wrapping_add(0xA0);
        } else if half {
            a = a.wrapping_add(0xFA);
        }

        self.regs.set_a(a);
        self.regs.set_flags(a == 0, subtract, false, carry);
    }

    pub(super) fn alu_rlc(&mut self, val: u8) -> u8 {
        let result = val.rotate_left(1);
        self.regs.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(super) fn alu_rrc(&mut self, val: u8) -> u8 {
        let result = val.rotate_right(1);
        self.regs.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(super) fn alu_rl(&mut self, val: u8) -> u8 {
        let result = (val << 1) | bits::b(self.regs.flag(FLAG_C));
        self.regs.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(super) fn alu_rr(&mut self, val: u8) -> u8 {
        let result = (val >> 1) | (bits::b(self.regs.flag(FLAG_C)) << 7);
        self.regs.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(super) fn alu_sla(&mut self, val: u8) -> u8 {
        let result = val << 1;
        self.regs.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(super) fn alu_sra(&mut self, val: u8) -> u8 {
        let result = (val >> 1) | (val & 0x80);
        self.regs.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(super) fn alu_srl(&mut self, val: u8) -> u8 {
        let result = val >> 1;
        self.regs.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(super) fn alu_swap(&mut self, val: u8) -> u8 {
        let result = val.rotate_left(4);
        self.regs.set_flags(result == 0, false, false, false);
        result
    }

    pub(super) fn alu_bit(&mut self, bit: u8, val: u8) {
        let carry = self.regs.flag(FLAG_C);
        self.regs
            .set_flags(!bits::test(val, bit), false, true, carry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_with(a: u8, f: u8) -> Cpu {
        let mut cpu = Cpu::default();
        cpu.regs.set_a(a);
        cpu.regs.af.set_lo(f);
        cpu
    }

    #[test]
    fn add_sets_half_and_full_carry() {
        let mut cpu = cpu_with(0x3A, 0);
        cpu.alu_add(0xC6, false);
        assert_eq!(cpu.regs.a(), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);

        let mut cpu = cpu_with(0x0F, 0);
        cpu.alu_add(0x01, false);
        assert_eq!(cpu.regs.a(), 0x10);
        assert_eq!(cpu.regs.f(), FLAG_H);
    }

    #[test]
    fn adc_includes_incoming_carry_in_half_carry() {
        let mut cpu = cpu_with(0x0E, FLAG_C);
        cpu.alu_add(0x01, true);
        assert_eq!(cpu.regs.a(), 0x10);
        assert_eq!(cpu.regs.f(), FLAG_H);

        let mut cpu = cpu_with(0xFF, FLAG_C);
        cpu.alu_add(0x00, true);
        assert_eq!(cpu.regs.a(), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);
    }

    #[test]
    fn sub_and_sbc_borrow() {
        let mut cpu = cpu_with(0x3E, 0);
        cpu.alu_sub(0x3E, false);
        assert_eq!(cpu.regs.a(), 0);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N);

        let mut cpu = cpu_with(0x3B, FLAG_C);
        cpu.alu_sub(0x2A, true);
        assert_eq!(cpu.regs.a(), 0x10);
        assert_eq!(cpu.regs.f(), FLAG_N);

        let mut cpu = cpu_with(0x10, FLAG_C);
        cpu.alu_sub(0x0F, true);
        assert_eq!(cpu.regs.a(), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N | FLAG_H);

        let mut cpu = cpu_with(0x00, 0);
        cpu.alu_sub(0x01, false);
        assert_eq!(cpu.regs.a(), 0xFF);
        assert_eq!(cpu.regs.f(), FLAG_N | FLAG_H | FLAG_C);
    }

    #[test]
    fn cp_leaves_a_alone() {
        let mut cpu = cpu_with(0x3C, 0);
        cpu.alu_cp(0x40);
        assert_eq!(cpu.regs.a(), 0x3C);
        assert_eq!(cpu.regs.f(), FLAG_N | FLAG_C);
        cpu.alu_cp(0x2F);
        assert_eq!(cpu.regs.f(), FLAG_N | FLAG_H);
        cpu.alu_cp(0x3C);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N);
    }

    #[test]
    fn logic_ops_flags() {
        let mut cpu = cpu_with(0x5A, FLAG_C);
        cpu.alu_and(0x0F);
        assert_eq!(cpu.regs.a(), 0x0A);
        assert_eq!(cpu.regs.f(), FLAG_H);
        cpu.alu_xor(0x0A);
        assert_eq!(cpu.regs.f(), FLAG_Z);
        cpu.alu_or(0x80);
        assert_eq!(cpu.regs.a(), 0x80);
        assert_eq!(cpu.regs.f(), 0);
    }

    #[test]
    fn inc_dec_preserve_carry() {
        let mut cpu = cpu_with(0, FLAG_C);
        assert_eq!(cpu.alu_inc(0xFF), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);
        assert_eq!(cpu.alu_dec(0x10), 0x0F);
        assert_eq!(cpu.regs.f(), FLAG_N | FLAG_H | FLAG_C);
        assert_eq!(cpu.alu_dec(0x01), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N | FLAG_C);
    }

    #[test]
    fn add16_carries_from_bit_11_and_15() {
        let mut cpu = cpu_with(0, FLAG_Z);
        cpu.regs.hl.set(0x8A23);
        cpu.alu_add16(0x0605);
        assert_eq!(cpu.regs.hl.get(), 0x9028);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H);

        cpu.regs.hl.set(0x8A23);
        cpu.alu_add16(0x8A23);
        assert_eq!(cpu.regs.hl.get(), 0x1446);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);
    }

    #[test]
    fn sp_offset_uses_low_byte_flags() {
        let mut cpu = cpu_with(0, FLAG_Z | FLAG_N);
        cpu.regs.sp.set(0xFFF8);
        assert_eq!(cpu.alu_sp_offset(0x02), 0xFFFA);
        assert_eq!(cpu.regs.f(), 0);

        cpu.regs.sp.set(0x00FF);
        assert_eq!(cpu.alu_sp_offset(0xFF), 0x00FE);
        assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
    }

    #[test]
    fn daa_after_addition() {
        let mut cpu = cpu_with(0x45, 0);
        cpu.alu_add(0x38, false);
        cpu.alu_daa();
        assert_eq!(cpu.regs.a(), 0x83);
        assert!(!cpu.regs.flag(FLAG_C));

        let mut cpu = cpu_with(0x99, 0);
        cpu.alu_add(0x01, false);
        cpu.alu_daa();
        assert_eq!(cpu.regs.a(), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_C);
    }

    #[test]
    fn daa_after_subtraction() {
        let mut cpu = cpu_with(0x83, 0);
        cpu.alu_sub(0x38, false);
        cpu.alu_daa();
        assert_eq!(cpu.regs.a(), 0x45);
        assert_eq!(cpu.regs.f(), FLAG_N);

        let mut cpu = cpu_with(0x10, 0);
        cpu.alu_sub(0x20, false);
        cpu.alu_daa();
        assert_eq!(cpu.regs.a(), 0x90);
        assert_eq!(cpu.regs.f(), FLAG_N | FLAG_C);
    }

    #[test]
    fn daa_leaves_valid_bcd_untouched() {
        for hi in 0..=9u8 {
            for lo in 0..=9u8 {
                let bcd = hi << 4 | lo;
                let mut cpu = cpu_with(bcd, 0);
                cpu.alu_daa();
                assert_eq!(cpu.regs.a(), bcd, "DAA changed {bcd:#04x}");
                assert_eq!(cpu.regs.flag(FLAG_Z), bcd == 0);
                assert!(!cpu.regs.flag(FLAG_C));
                assert!(!cpu.regs.flag(FLAG_H));
            }
        }
    }

    #[test]
    fn rotates_through_carry() {
        let mut cpu = cpu_with(0, FLAG_C);
        assert_eq!(cpu.alu_rl(0x80), 0x01);
        assert!(cpu.regs.flag(FLAG_C));
        assert_eq!(cpu.alu_rr(0x00), 0x80);
        assert!(!cpu.regs.flag(FLAG_C));
        assert_eq!(cpu.alu_rl(0x80), 0x00);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_C);
    }

    #[test]
    fn shifts_and_swap() {
        let mut cpu = Cpu::default();
        assert_eq!(cpu.alu_sra(0x81), 0xC0);
        assert!(cpu.regs.flag(FLAG_C));
        assert_eq!(cpu.alu_srl(0x81), 0x40);
        assert_eq!(cpu.alu_sla(0x81), 0x02);
        assert_eq!(cpu.alu_swap(0xF1), 0x1F);
        assert_eq!(cpu.regs.f(), 0);
        assert_eq!(cpu.alu_rrc(0x01), 0x80);
        assert_eq!(cpu.alu_rlc(0x80), 0x01);
    }

    #[test]
    fn bit_keeps_carry() {
        let mut cpu = cpu_with(0, FLAG_C);
        cpu.alu_bit(7, 0x7F);
        assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);
        cpu.alu_bit(0, 0x01);
        assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
    }
}
