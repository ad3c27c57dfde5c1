//! The 0xCB-prefixed table: shifts and rotates, then BIT, RES and SET.

use super::{Cpu, Handler};
use crate::{bits, mmu::Mmu};

pub(super) static TABLE: [Handler; 256] = {
    let mut t: [Handler; 256] = [shift as Handler; 256];
    let mut i = 0x40;
    while i < 0x100 {
        t[i] = match i >> 6 {
            1 => bit as Handler,
            2 => res as Handler,
            _ => set as Handler,
        };
        i += 1;
    }
    t
};

/// RLC RRC RL RR SLA SRA SWAP SRL, selected by bits 3-5.
fn shift(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    let res = match (opcode >> 3) & 0x07 {
        0 => cpu.alu_rlc(val),
        1 => cpu.alu_rrc(val),
        2 => cpu.alu_rl(val),
        3 => cpu.alu_rr(val),
        4 => cpu.alu_sla(val),
        5 => cpu.alu_sra(val),
        6 => cpu.alu_swap(val),
        _ => cpu.alu_srl(val),
    };
    cpu.write_reg(mmu, opcode, res);
}

fn bit(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    cpu.alu_bit((opcode >> 3) & 0x07, val);
}

fn res(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    cpu.write_reg(mmu, opcode, bits::reset(val, (opcode >> 3) & 0x07));
}

fn set(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    let val = cpu.read_reg(mmu, opcode);
    cpu.write_reg(mmu, opcode, bits::set(val, (opcode >> 3) & 0x07));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::FLAG_C;

    fn exec(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
        TABLE[usize::from(opcode)](cpu, mmu, opcode);
    }

    #[test]
    fn swap_and_srl_on_registers() {
        let mut cpu = Cpu::default();
        let mut mmu = Mmu::default();
        cpu.regs.bc.set(0xAB01);
        exec(&mut cpu, &mut mmu, 0x30); // SWAP B
        assert_eq!(cpu.regs.bc.hi(), 0xBA);
        exec(&mut cpu, &mut mmu, 0x39); // SRL C
        assert_eq!(cpu.regs.bc.lo(), 0x00);
        assert!(cpu.regs.flag(FLAG_C));
    }

    #[test]
    fn res_and_set_through_hl() {
        let mut cpu = Cpu::default();
        let mut mmu = Mmu::default();
        cpu.regs.hl.set(0xC010);
        mmu.write_byte(0xC010, 0xFF);
        exec(&mut cpu, &mut mmu, 0xBE); // RES 7,(HL)
        assert_eq!(mmu.read_byte(0xC010), 0x7F);
        exec(&mut cpu, &mut mmu, 0xC6); // SET 0,(HL)
        assert_eq!(mmu.read_byte(0xC010), 0x7F);
        exec(&mut cpu, &mut mmu, 0xFF); // SET 7,A
        assert_eq!(cpu.regs.a() & 0x80, 0x80);
    }
}
