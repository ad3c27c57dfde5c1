//! The five interrupt sources, in ascending priority by bit index.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Every interrupt, highest priority first.
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0,
            Interrupt::LcdStat => 1,
            Interrupt::Timer => 2,
            Interrupt::Serial => 3,
            Interrupt::Joypad => 4,
        }
    }

    #[inline]
    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }

    /// Address the CPU jumps to when servicing this interrupt.
    #[inline]
    pub const fn vector(self) -> u16 {
        0x40 + 8 * self.bit() as u16
    }

    /// Highest-priority interrupt that is both requested and enabled.
    pub fn highest_pending(if_reg: u8, ie_reg: u8) -> Option<Interrupt> {
        let pending = if_reg & ie_reg & 0x1F;
        Self::ALL.into_iter().find(|i| pending & i.mask() != 0)
    }
}

/// Sets the request bit for `interrupt` in an IF register value.
#[inline]
pub fn request(if_reg: &mut u8, interrupt: Interrupt) {
    *if_reg |= interrupt.mask();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_follow_bit_order() {
        let vectors: Vec<u16> = Interrupt::ALL.iter().map(|i| i.vector()).collect();
        assert_eq!(vectors, [0x40, 0x48, 0x50, 0x58, 0x60]);
    }

    #[test]
    fn lowest_bit_wins() {
        assert_eq!(Interrupt::highest_pending(0x1F, 0x1F), Some(Interrupt::VBlank));
        assert_eq!(Interrupt::highest_pending(0x14, 0x1F), Some(Interrupt::Timer));
        assert_eq!(Interrupt::highest_pending(0x14, 0x10), Some(Interrupt::Joypad));
        assert_eq!(Interrupt::highest_pending(0xE0, 0xFF), None);
    }
}
