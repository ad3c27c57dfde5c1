//! Game Boy / Game Boy Color emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU/APU/etc).
//! Frontends drive the core one video frame at a time through the [`gameboy`]
//! facade and consume its prepared framebuffer, audio samples and serial output.

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Stateless bit helpers shared by the CPU and the peripherals.
pub mod bits;

/// Cartridge header parsing, banking controllers and battery saves.
pub mod cartridge;

/// SM83 CPU core and its opcode dispatch tables.
pub mod cpu;

/// Error types returned by ROM loading and instruction dispatch.
pub mod error;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Interrupt request/enable bookkeeping.
pub mod interrupts;

/// Joypad register and button state.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Construction options and runtime debug flags.
pub mod options;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// CPU register pairs.
pub mod registers;

/// Serial port and transfer callback.
pub mod serial;

/// Divider/timer unit.
pub mod timer;

pub use error::{CpuError, LoadError};
pub use gameboy::GameBoy;
pub use options::GameBoyOptions;
