use crate::interrupts::{self, Interrupt};

/// Cycles between DIV increments.
pub const DIV_PERIOD: u32 = 256;

/// Divider and programmable timer.
///
/// Both counters are driven from accumulated CPU cycles rather than a
/// per-cycle falling-edge detector.
#[derive(Debug, Clone)]
pub struct Timer {
    /// Divider register, the upper byte of the free-running counter.
    pub div: u8,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    div_counter: u32,
    timer_counter: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            div_counter: 0,
            timer_counter: Self::period_for(0),
        }
    }

    /// Cycles between TIMA increments for the frequency bits of `tac`.
    pub fn period_for(tac: u8) -> u32 {
        match tac & 0x03 {
            0 => 1024,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    pub fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => self.reset_div(),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                let old_freq = self.tac & 0x03;
                self.tac = val & 0x07;
                if self.tac & 0x03 != old_freq {
                    self.timer_counter = Self::period_for(self.tac);
                }
            }
            _ => {}
        }
    }

    pub fn reset_div(&mut self) {
        self.div = 0;
        self.div_counter = 0;
    }

    /// Advance the timer by `cycles` CPU cycles and update IF when TIMA
    /// overflows.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        self.div_counter += cycles;
        while self.div_counter >= DIV_PERIOD {
            self.div_counter -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if !self.enabled() {
            return;
        }

        let mut remaining = cycles;
        while remaining > 0 {
            let step = remaining.min(self.timer_counter);
            remaining -= step;
            self.timer_counter -= step;
            if self.timer_counter == 0 {
                self.timer_counter = Self::period_for(self.tac);
                self.increment(if_reg);
            }
        }
    }

    fn increment(&mut self, if_reg: &mut u8) {
        if self.tima == 0xFF {
            self.tima = self.tma;
            interrupts::request(if_reg, Interrupt::Timer);
        } else {
            self.tima += 1;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_ticks_every_256_cycles() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.step(255, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 0);
        timer.step(1, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 1);
        timer.step(256 * 3, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 4);
    }

    #[test]
    fn div_write_resets() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.step(1000, &mut if_reg);
        timer.write(0xFF04, 0x55);
        assert_eq!(timer.read(0xFF04), 0);
        timer.step(255, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 0);
    }

    #[test]
    fn tima_overflow_reloads_and_requests() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.write(0xFF06, 0xAB);
        timer.write(0xFF07, 0x05);
        timer.write(0xFF05, 0xFF);
        timer.step(15, &mut if_reg);
        assert_eq!(timer.tima, 0xFF);
        assert_eq!(if_reg & 0x04, 0);
        timer.step(1, &mut if_reg);
        assert_eq!(timer.tima, 0xAB);
        assert_eq!(if_reg & 0x04, 0x04);
    }

    #[test]
    fn disabled_timer_holds_tima() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.write(0xFF07, 0x01);
        timer.step(4096, &mut if_reg);
        assert_eq!(timer.tima, 0);
    }

    #[test]
    fn each_frequency_selects_its_period() {
        for (tac, period) in [(0x04, 1024), (0x05, 16), (0x06, 64), (0x07, 256)] {
            let mut timer = Timer::new();
            let mut if_reg = 0;
            timer.write(0xFF07, tac);
            timer.step(period * 3, &mut if_reg);
            assert_eq!(timer.tima, 3, "tac {tac:#04X}");
        }
    }

    #[test]
    fn tac_reads_unused_bits_high() {
        let mut timer = Timer::new();
        timer.write(0xFF07, 0xFD);
        assert_eq!(timer.read(0xFF07), 0xFD);
        timer.write(0xFF07, 0x00);
        assert_eq!(timer.read(0xFF07), 0xF8);
    }
}
