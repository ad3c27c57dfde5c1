//! The unprefixed opcode table. Register-indexed rows share one handler that
//! decodes its operands from the opcode bits.

use super::{Cpu, Handler, cycles};
use crate::{
    mmu::Mmu,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z},
};

macro_rules! op {
    ($f:expr) => {
        Some($f as Handler)
    };
}

/// Opcode handlers; `None` marks the bytes with no instruction.
pub(super) static TABLE: [Option<Handler>; 256] = {
    let mut t: [Option<Handler>; 256] = [None; 256];

    t[0x00] = op!(nop);
    t[0x07] = op!(rlca);
    t[0x08] = op!(ld_nn_sp);
    t[0x0F] = op!(rrca);
    t[0x10] = op!(stop);
    t[0x17] = op!(rla);
    t[0x18] = op!(jr);
    t[0x1F] = op!(rra);
    t[0x27] = op!(daa);
    t[0x2F] = op!(cpl);
    t[0x37] = op!(scf);
    t[0x3F] = op!(ccf);

    // 16-bit loads, increments and HL adds, one per pair
    let mut row = 0;
    while row < 4 {
        let base = row << 4;
        t[base + 0x01] = op!(ld_rr_nn);
        t[base + 0x02] = op!(ld_ind_a);
        t[base + 0x03] = op!(inc_rr);
        t[base + 0x09] = op!(add_hl_rr);
        t[base + 0x0A] = op!(ld_a_ind);
        t[base + 0x0B] = op!(dec_rr);
        row += 1;
    }

    let mut r = 0;
    while r < 8 {
        t[0x04 + (r << 3)] = op!(inc_r);
        t[0x05 + (r << 3)] = op!(dec_r);
        t[0x06 + (r << 3)] = op!(ld_r_n);
        r += 1;
    }

    let mut cc = 0;
    while cc < 4 {
        t[0x20 + (cc << 3)] = op!(jr_cc);
        t[0xC0 + (cc << 3)] = op!(ret_cc);
        t[0xC2 + (cc << 3)] = op!(jp_cc);
        t[0xC4 + (cc << 3)] = op!(call_cc);
        cc += 1;
    }

    let mut i = 0x40;
    while i < 0x80 {
        t[i] = op!(ld_r_r);
        i += 1;
    }
    t[0x76] = op!(halt);

    let mut i = 0x80;
    while i < 0xC0 {
        t[i] = op!(alu_a_r);
        i += 1;
    }

    let mut i = 0;
    while i < 8 {
        t[0xC6 + (i << 3)] = op!(alu_a_n);
        t[0xC7 + (i << 3)] = op!(rst);
        i += 1;
    }

    let mut row = 0;
    while row < 4 {
        t[0xC1 + (row << 4)] = op!(pop);
        t[0xC5 + (row << 4)] = op!(push);
        row += 1;
    }

    t[0xC3] = op!(jp);
    t[0xC9] = op!(ret);
    t[0xCD] = op!(call);
    t[0xD9] = op!(reti);
    t[0xE0] = op!(ldh_n_a);
    t[0xE2] = op!(ldh_c_a);
    t[0xE8] = op!(add_sp_e);
    t[0xE9] = op!(jp_hl);
    t[0xEA] = op!(ld_nn_a);
    t[0xF0] = op!(ldh_a_n);
    t[0xF2] = op!(ldh_a_c);
    t[0xF3] = op!(di);
    t[0xF8] = op!(ld_hl_sp_e);
    t[0xF9] = op!(ld_sp_hl);
    t[0xFA] = op!(ld_a_nn);
    t[0xFB] = op!(ei);
    t
};

impl Cpu {
    /// NZ, Z, NC, C selected by bits 3-4 of a conditional opcode.
    fn condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            _ => self.regs.flag(FLAG_C),
        }
    }

    fn jump_relative(&mut self, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as u16);
    }

    fn call_to(&mut self, mmu: &mut Mmu, addr: u16) {
        let pc = self.regs.pc;
        self.push_stack(mmu, pc);
        self.regs.pc = addr;
    }
}

fn nop(_: &mut Cpu, _: &mut Mmu, _: u8) {}

fn ld_rr_nn(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.fetch16(mmu);
    cpu.pair_mut(opcode >> 4).set(val);
}

/// Address for the (BC), (DE), (HL+), (HL-) loads; adjusts HL afterwards.
fn indirect_addr(cpu: &mut Cpu, opcode: u8) -> u16 {
    match (opcode >> 4) & 0x03 {
        0 => cpu.regs.bc.get(),
        1 => cpu.regs.de.get(),
        2 => {
            let hl = cpu.regs.hl.get();
            cpu.regs.hl.set(hl.wrapping_add(1));
            hl
        }
        _ => {
            let hl = cpu.regs.hl.get();
            cpu.regs.hl.set(hl.wrapping_sub(1));
            hl
        }
    }
}

fn ld_ind_a(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let addr = indirect_addr(cpu, opcode);
    mmu.write_byte(addr, cpu.regs.a());
}

fn ld_a_ind(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let addr = indirect_addr(cpu, opcode);
    cpu.regs.set_a(mmu.read_byte(addr));
}

fn inc_rr(cpu: &mut Cpu, _: &mut Mmu, opcode: u8) {
    let reg = cpu.pair_mut(opcode >> 4);
    reg.set(reg.get().wrapping_add(1));
}

fn dec_rr(cpu: &mut Cpu, _: &mut Mmu, opcode: u8) {
    let reg = cpu.pair_mut(opcode >> 4);
    reg.set(reg.get().wrapping_sub(1));
}

fn add_hl_rr(cpu: &mut Cpu, _: &mut Mmu, opcode: u8) {
    let val = cpu.pair(opcode >> 4);
    cpu.alu_add16(val);
}

fn inc_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let r = opcode >> 3;
    let val = cpu.read_reg(mmu, r);
    let res = cpu.alu_inc(val);
    cpu.write_reg(mmu, r, res);
}

fn dec_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let r = opcode >> 3;
    let val = cpu.read_reg(mmu, r);
    let res = cpu.alu_dec(val);
    cpu.write_reg(mmu, r, res);
}

fn ld_r_n(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.fetch8(mmu);
    cpu.write_reg(mmu, opcode >> 3, val);
}

fn ld_r_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    cpu.write_reg(mmu, opcode >> 3, val);
}

fn rlca(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let res = cpu.alu_rlc(cpu.regs.a());
    cpu.regs.set_a(res);
    cpu.regs.set_flag(FLAG_Z, false);
}

fn rrca(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let res = cpu.alu_rrc(cpu.regs.a());
    cpu.regs.set_a(res);
    cpu.regs.set_flag(FLAG_Z, false);
}

fn rla(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let res = cpu.alu_rl(cpu.regs.a());
    cpu.regs.set_a(res);
    cpu.regs.set_flag(FLAG_Z, false);
}

fn rra(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let res = cpu.alu_rr(cpu.regs.a());
    cpu.regs.set_a(res);
    cpu.regs.set_flag(FLAG_Z, false);
}

fn ld_nn_sp(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let addr = cpu.fetch16(mmu);
    let sp = cpu.regs.sp.get();
    mmu.write_byte(addr, sp as u8);
    mmu.write_byte(addr.wrapping_add(1), (sp >> 8) as u8);
}

fn stop(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    // STOP is two bytes long
    cpu.fetch8(mmu);
    mmu.switch_speed();
}

fn jr(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let offset = cpu.fetch8(mmu);
    cpu.jump_relative(offset);
}

fn jr_cc(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let offset = cpu.fetch8(mmu);
    if cpu.condition(opcode) {
        cpu.jump_relative(offset);
        cpu.extra_cycles += cycles::JUMP_TAKEN * 4;
    }
}

fn daa(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.alu_daa();
}

fn cpl(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.regs.set_a(!cpu.regs.a());
    cpu.regs.set_flag(FLAG_N, true);
    cpu.regs.set_flag(FLAG_H, true);
}

fn scf(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.regs.set_flag(FLAG_N, false);
    cpu.regs.set_flag(FLAG_H, false);
    cpu.regs.set_flag(FLAG_C, true);
}

fn ccf(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let carry = cpu.regs.flag(FLAG_C);
    cpu.regs.set_flag(FLAG_N, false);
    cpu.regs.set_flag(FLAG_H, false);
    cpu.regs.set_flag(FLAG_C, !carry);
}

fn halt(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.halted = true;
}

/// ADD ADC SUB SBC AND XOR OR CP, selected by bits 3-5.
fn alu_dispatch(cpu: &mut Cpu, opcode: u8, val: u8) {
    match (opcode >> 3) & 0x07 {
        0 => cpu.alu_add(val, false),
        1 => cpu.alu_add(val, true),
        2 => cpu.alu_sub(val, false),
        3 => cpu.alu_sub(val, true),
        4 => cpu.alu_and(val),
        5 => cpu.alu_xor(val),
        6 => cpu.alu_or(val),
        _ => cpu.alu_cp(val),
    }
}

fn alu_a_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    alu_dispatch(cpu, opcode, val);
}

fn alu_a_n(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.fetch8(mmu);
    alu_dispatch(cpu, opcode, val);
}

fn ret(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    cpu.regs.pc = cpu.pop_stack(mmu);
}

fn reti(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    cpu.regs.pc = cpu.pop_stack(mmu);
    cpu.ime = true;
}

fn ret_cc(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    if cpu.condition(opcode) {
        cpu.regs.pc = cpu.pop_stack(mmu);
        cpu.extra_cycles += cycles::CALL_TAKEN * 4;
    }
}

fn pop(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.pop_stack(mmu);
    match (opcode >> 4) & 0x03 {
        3 => cpu.regs.af.set(val),
        index => cpu.pair_mut(index).set(val),
    }
}

fn push(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = match (opcode >> 4) & 0x03 {
        3 => cpu.regs.af.get(),
        index => cpu.pair(index),
    };
    cpu.push_stack(mmu, val);
}

fn jp(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    cpu.regs.pc = cpu.fetch16(mmu);
}

fn jp_cc(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let addr = cpu.fetch16(mmu);
    if cpu.condition(opcode) {
        cpu.regs.pc = addr;
        cpu.extra_cycles += cycles::JUMP_TAKEN * 4;
    }
}

fn jp_hl(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.regs.pc = cpu.regs.hl.get();
}

fn call(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let addr = cpu.fetch16(mmu);
    cpu.call_to(mmu, addr);
}

fn call_cc(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let addr = cpu.fetch16(mmu);
    if cpu.condition(opcode) {
        cpu.call_to(mmu, addr);
        cpu.extra_cycles += cycles::CALL_TAKEN * 4;
    }
}

fn rst(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    cpu.call_to(mmu, u16::from(opcode & 0x38));
}

fn ldh_n_a(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let offset = cpu.fetch8(mmu);
    mmu.write_byte(0xFF00 | u16::from(offset), cpu.regs.a());
}

fn ldh_a_n(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let offset = cpu.fetch8(mmu);
    cpu.regs.set_a(mmu.read_byte(0xFF00 | u16::from(offset)));
}

fn ldh_c_a(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    mmu.write_byte(0xFF00 | u16::from(cpu.regs.bc.lo()), cpu.regs.a());
}

fn ldh_a_c(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    cpu.regs
        .set_a(mmu.read_byte(0xFF00 | u16::from(cpu.regs.bc.lo())));
}

fn ld_nn_a(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let addr = cpu.fetch16(mmu);
    mmu.write_byte(addr, cpu.regs.a());
}

fn ld_a_nn(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let addr = cpu.fetch16(mmu);
    cpu.regs.set_a(mmu.read_byte(addr));
}

fn add_sp_e(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let offset = cpu.fetch8(mmu);
    let sp = cpu.alu_sp_offset(offset);
    cpu.regs.sp.set(sp);
}

fn ld_hl_sp_e(cpu: &mut Cpu, mmu: &mut Mmu, _: u8) {
    let offset = cpu.fetch8(mmu);
    let val = cpu.alu_sp_offset(offset);
    cpu.regs.hl.set(val);
}

fn ld_sp_hl(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    let hl = cpu.regs.hl.get();
    cpu.regs.sp.set(hl);
}

fn di(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.ime = false;
    cpu.interrupts_enabling = false;
}

fn ei(cpu: &mut Cpu, _: &mut Mmu, _: u8) {
    cpu.interrupts_enabling = true;
}
