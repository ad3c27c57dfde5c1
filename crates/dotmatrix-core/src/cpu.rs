mod alu;
mod cb_opcodes;
mod cycles;
mod opcodes;

use log::{error, trace};

use crate::{
    error::CpuError,
    interrupts::Interrupt,
    mmu::Mmu,
    registers::{Register, Registers},
};

/// Cycles spent pushing PC and jumping to an interrupt vector.
pub const INTERRUPT_CYCLES: u32 = 20;

/// An opcode handler. Receives the opcode byte so one handler can serve a
/// whole row of register-indexed instructions.
type Handler = fn(&mut Cpu, &mut Mmu, u8);

pub struct Cpu {
    pub regs: Registers,
    pub halted: bool,
    pub ime: bool,
    /// Set by EI; interrupts turn on at the next interrupt check.
    pub interrupts_enabling: bool,
    /// Per-instruction trace output at `trace` level.
    pub trace: bool,
    extra_cycles: u32,
}

impl Cpu {
    /// Create a CPU with the post-boot register state for the selected mode.
    pub fn new(cgb: bool) -> Self {
        Self {
            regs: Registers::post_boot(cgb),
            halted: false,
            ime: false,
            interrupts_enabling: false,
            trace: false,
            extra_cycles: 0,
        }
    }

    /// Fetch, decode and execute one instruction, returning the number of
    /// clock cycles it took.
    pub fn execute_next_opcode(&mut self, mmu: &mut Mmu) -> Result<u32, CpuError> {
        let pc = self.regs.pc;
        let opcode = self.fetch8(mmu);
        if self.trace || cfg!(feature = "cpu-trace") {
            trace!("{} op={opcode:02X}", self.debug_state_at(pc));
        }

        self.extra_cycles = 0;
        let base = if opcode == 0xCB {
            let cb = self.fetch8(mmu);
            cb_opcodes::TABLE[usize::from(cb)](self, mmu, cb);
            cycles::cb(cb)
        } else {
            let Some(handler) = opcodes::TABLE[usize::from(opcode)] else {
                error!("Unknown opcode {opcode:#04X} at PC={pc:#06X}");
                return Err(CpuError::UnknownOpcode { opcode, pc });
            };
            handler(self, mmu, opcode);
            cycles::OPCODE[usize::from(opcode)]
        };
        Ok(u32::from(base) * 4 + self.extra_cycles)
    }

    /// Run the interrupt check that follows every instruction. Returns the
    /// cycles spent servicing an interrupt, if one was taken.
    pub fn service_interrupts(&mut self, mmu: &mut Mmu) -> u32 {
        if self.interrupts_enabling {
            self.ime = true;
            self.interrupts_enabling = false;
            return 0;
        }
        if !self.ime && !self.halted {
            return 0;
        }

        let Some(interrupt) = Interrupt::highest_pending(mmu.if_reg, mmu.ie_reg) else {
            return 0;
        };
        if !self.ime {
            // a pending interrupt wakes a halted CPU without being serviced
            self.halted = false;
            return 0;
        }

        mmu.if_reg &= !interrupt.mask();
        self.ime = false;
        self.halted = false;
        let pc = self.regs.pc;
        self.push_stack(mmu, pc);
        self.regs.pc = interrupt.vector();
        INTERRUPT_CYCLES
    }

    pub fn debug_state(&self) -> String {
        self.debug_state_at(self.regs.pc)
    }

    fn debug_state_at(&self, pc: u16) -> String {
        format!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X}",
            self.regs.a(),
            self.regs.f(),
            self.regs.bc.hi(),
            self.regs.bc.lo(),
            self.regs.de.hi(),
            self.regs.de.lo(),
            self.regs.hl.hi(),
            self.regs.hl.lo(),
            self.regs.sp.get(),
            pc,
        )
    }

    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = u16::from(self.fetch8(mmu));
        let hi = u16::from(self.fetch8(mmu));
        (hi << 8) | lo
    }

    /// Push a word; the high byte lands at the higher address.
    pub fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        let sp = self.regs.sp.get().wrapping_sub(2);
        self.regs.sp.set(sp);
        mmu.write_byte(sp, val as u8);
        mmu.write_byte(sp.wrapping_add(1), (val >> 8) as u8);
    }

    pub fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let sp = self.regs.sp.get();
        let lo = u16::from(mmu.read_byte(sp));
        let hi = u16::from(mmu.read_byte(sp.wrapping_add(1)));
        self.regs.sp.set(sp.wrapping_add(2));
        (hi << 8) | lo
    }

    /// Read an 8-bit operand by its encoding index: B C D E H L (HL) A.
    fn read_reg(&self, mmu: &Mmu, index: u8) -> u8 {
        match index & 0x07 {
            0 => self.regs.bc.hi(),
            1 => self.regs.bc.lo(),
            2 => self.regs.de.hi(),
            3 => self.regs.de.lo(),
            4 => self.regs.hl.hi(),
            5 => self.regs.hl.lo(),
            6 => mmu.read_byte(self.regs.hl.get()),
            _ => self.regs.a(),
        }
    }

    fn write_reg(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        match index & 0x07 {
            0 => self.regs.bc.set_hi(val),
            1 => self.regs.bc.set_lo(val),
            2 => self.regs.de.set_hi(val),
            3 => self.regs.de.set_lo(val),
            4 => self.regs.hl.set_hi(val),
            5 => self.regs.hl.set_lo(val),
            6 => mmu.write_byte(self.regs.hl.get(), val),
            _ => self.regs.set_a(val),
        }
    }

    /// 16-bit pair by encoding index: BC DE HL SP.
    fn pair_mut(&mut self, index: u8) -> &mut Register {
        match index & 0x03 {
            0 => &mut self.regs.bc,
            1 => &mut self.regs.de,
            2 => &mut self.regs.hl,
            _ => &mut self.regs.sp,
        }
    }

    fn pair(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.regs.bc.get(),
            1 => self.regs.de.get(),
            2 => self.regs.hl.get(),
            _ => self.regs.sp.get(),
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(false)
    }
}
