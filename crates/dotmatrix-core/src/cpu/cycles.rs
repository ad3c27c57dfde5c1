//! Base machine-cycle costs. Conditional branches add their taken penalty
//! at execution time.

#[rustfmt::skip]
pub(super) const OPCODE: [u8; 256] = [
    1, 3, 2, 2, 1, 1, 2, 1, 5, 2, 2, 2, 1, 1, 2, 1, // 0x00
    1, 3, 2, 2, 1, 1, 2, 1, 3, 2, 2, 2, 1, 1, 2, 1, // 0x10
    2, 3, 2, 2, 1, 1, 2, 1, 2, 2, 2, 2, 1, 1, 2, 1, // 0x20
    2, 3, 2, 2, 3, 3, 3, 1, 2, 2, 2, 2, 1, 1, 2, 1, // 0x30
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0x40
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0x50
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0x60
    2, 2, 2, 2, 2, 2, 1, 2, 1, 1, 1, 1, 1, 1, 2, 1, // 0x70
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0x80
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0x90
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0xA0
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 0xB0
    2, 3, 3, 4, 3, 4, 2, 4, 2, 4, 3, 0, 3, 6, 2, 4, // 0xC0
    2, 3, 3, 0, 3, 4, 2, 4, 2, 4, 3, 0, 3, 0, 2, 4, // 0xD0
    3, 3, 2, 0, 0, 4, 2, 4, 4, 1, 4, 0, 0, 0, 2, 4, // 0xE0
    3, 3, 2, 1, 0, 4, 2, 4, 3, 2, 4, 1, 0, 0, 2, 4, // 0xF0
];

/// Extra machine cycles when a conditional JR/JP is taken.
pub(super) const JUMP_TAKEN: u32 = 1;
/// Extra machine cycles when a conditional CALL/RET is taken.
pub(super) const CALL_TAKEN: u32 = 3;

/// Cost of a CB-prefixed instruction, including the prefix fetch.
pub(super) fn cb(opcode: u8) -> u8 {
    match (opcode & 0x07 == 6, opcode) {
        (false, _) => 2,
        (true, 0x40..=0x7F) => 3,
        (true, _) => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cb_costs() {
        assert_eq!(cb(0x00), 2);
        assert_eq!(cb(0x06), 4);
        assert_eq!(cb(0x46), 3);
        assert_eq!(cb(0x7E), 3);
        assert_eq!(cb(0x86), 4);
        assert_eq!(cb(0xFF), 2);
    }
}
