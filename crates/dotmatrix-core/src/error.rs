use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read ROM: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("zip archive must contain exactly one file (found {0})")]
    ZipEntryCount(usize),
    #[error("ROM image is too small to hold a cartridge header ({0} bytes)")]
    RomTooSmall(usize),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("unimplemented opcode {opcode:#04X} at PC={pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },
}
