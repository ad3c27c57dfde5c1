use crate::interrupts::{self, Interrupt};

/// The eight logical buttons, numbered by their bit in the pressed mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Button::A => 0,
            Button::B => 1,
            Button::Select => 2,
            Button::Start => 3,
            Button::Right => 4,
            Button::Left => 5,
            Button::Up => 6,
            Button::Down => 7,
        }
    }
}

/// A batch of button edges collected by a frontend since the last frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonInput {
    pub pressed: Vec<Button>,
    pub released: Vec<Button>,
}

/// P1/JOYP register.
#[derive(Debug, Clone)]
pub struct Joypad {
    /// Low nibble action buttons, high nibble directions. A cleared bit is a
    /// pressed button.
    input_mask: u8,
    select: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            input_mask: 0xFF,
            select: 0x30,
        }
    }

    pub fn read(&self) -> u8 {
        let lines = if self.select & 0x10 != 0 {
            self.input_mask & 0x0F
        } else if self.select & 0x20 != 0 {
            self.input_mask >> 4
        } else {
            0x0F
        };
        self.select | 0xC0 | lines
    }

    /// Only the selection bits (4 and 5) are writable.
    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    pub fn press(&mut self, button: Button, if_reg: &mut u8) {
        self.input_mask &= !(1 << button.bit());
        interrupts::request(if_reg, Interrupt::Joypad);
    }

    pub fn release(&mut self, button: Button) {
        self.input_mask |= 1 << button.bit();
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.input_mask & (1 << button.bit()) == 0
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
