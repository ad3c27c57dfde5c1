/// Returns whether `bit` is set in `value`.
#[inline]
pub fn test(value: u8, bit: u8) -> bool {
    (value >> bit) & 1 == 1
}

/// Returns the value (0 or 1) of `bit` in `value`.
#[inline]
pub fn val(value: u8, bit: u8) -> u8 {
    (value >> bit) & 1
}

#[inline]
pub fn set(value: u8, bit: u8) -> u8 {
    value | (1 << bit)
}

#[inline]
pub fn reset(value: u8, bit: u8) -> u8 {
    value & !(1 << bit)
}

/// Carry out of bit 3 when adding two bytes.
#[inline]
pub fn half_carry_add(a: u8, b: u8) -> bool {
    (a & 0x0F) + (b & 0x0F) > 0x0F
}

/// Carry out of bit 11 when adding two words.
#[inline]
pub fn half_carry_add16(a: u16, b: u16) -> bool {
    (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF
}

/// Converts a bool into 1 or 0.
#[inline]
pub fn b(value: bool) -> u8 {
    u8::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_reset_single_bits() {
        assert_eq!(set(0x00, 7), 0x80);
        assert_eq!(reset(0xFF, 0), 0xFE);
        assert!(test(0x10, 4));
        assert!(!test(0x10, 3));
        assert_eq!(val(0x04, 2), 1);
    }

    #[test]
    fn half_carry_uses_nibble_sum() {
        assert!(half_carry_add(0x0F, 0x01));
        assert!(!half_carry_add(0x0E, 0x01));
        assert!(!half_carry_add(0xF0, 0x10));
        assert!(half_carry_add16(0x0FFF, 0x0001));
        assert!(!half_carry_add16(0xF000, 0x1000));
    }
}
