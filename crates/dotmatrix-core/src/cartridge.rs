use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::LoadError;

mod header;
mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod rom;
mod rtc;
mod save;

pub use header::{CartMode, Header};
pub use mbc1::Mbc1;
pub use mbc2::Mbc2;
pub use mbc3::Mbc3;
pub use mbc5::Mbc5;
pub use rom::Rom;
pub use rtc::{RTC_CYCLES_PER_SECOND, Rtc, RtcRegisters};
pub use save::{DEFAULT_SAVE_INTERVAL, SaveFlusher, write_save};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Maps CPU accesses in [0x0000,0x8000) and [0xA000,0xC000) onto cartridge
/// ROM and RAM.
pub trait BankingController {
    /// Reads ROM (0x0000-0x7FFF) or external RAM (0xA000-0xBFFF).
    fn read(&self, addr: u16) -> u8;

    /// Handles a write into ROM space. Only bank registers change; ROM
    /// contents are never modified.
    fn write_rom(&mut self, addr: u16, val: u8);

    /// Handles a write into external RAM. Returns `false` when the write
    /// was dropped (RAM disabled or absent).
    fn write_ram(&mut self, addr: u16, val: u8) -> bool;

    /// Bytes to persist in the `.sav` file.
    fn save_data(&self) -> Vec<u8>;

    fn load_save_data(&mut self, data: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

#[derive(Debug)]
pub enum Controller {
    Rom(Rom),
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

macro_rules! dispatch {
    ($controller:expr, $inner:ident => $body:expr) => {
        match $controller {
            Controller::Rom($inner) => $body,
            Controller::Mbc1($inner) => $body,
            Controller::Mbc2($inner) => $body,
            Controller::Mbc3($inner) => $body,
            Controller::Mbc5($inner) => $body,
        }
    };
}

impl Controller {
    pub fn kind(&self) -> MbcType {
        match self {
            Controller::Rom(_) => MbcType::RomOnly,
            Controller::Mbc1(_) => MbcType::Mbc1,
            Controller::Mbc2(_) => MbcType::Mbc2,
            Controller::Mbc3(_) => MbcType::Mbc3,
            Controller::Mbc5(_) => MbcType::Mbc5,
        }
    }

    /// Builds the controller named by the header's cartridge type byte.
    /// Types without a dedicated controller fall back to MBC1.
    pub fn for_header(header: &Header, rom: Vec<u8>) -> Self {
        let ram_size = header.ram_size();
        match header.cart_type {
            0x00 | 0x08 | 0x09 | 0x0B | 0x0C | 0x0D => Controller::Rom(Rom::new(rom)),
            0x01..=0x03 => Controller::Mbc1(Mbc1::new(rom, ram_size)),
            0x04..=0x06 => Controller::Mbc2(Mbc2::new(rom)),
            0x07..=0x13 => Controller::Mbc3(Mbc3::new(rom, ram_size, header.has_rtc())),
            0x15..=0x17 => {
                warn!("MBC4 cartridges are not supported; using MBC1 banking");
                Controller::Mbc1(Mbc1::new(rom, ram_size))
            }
            0x14 | 0x18..=0x1E => Controller::Mbc5(Mbc5::new(rom, ram_size)),
            other => {
                warn!("Cartridge type {other:#04X} may not be supported; using MBC1 banking");
                Controller::Mbc1(Mbc1::new(rom, ram_size))
            }
        }
    }
}

impl BankingController for Controller {
    fn read(&self, addr: u16) -> u8 {
        dispatch!(self, c => c.read(addr))
    }

    fn write_rom(&mut self, addr: u16, val: u8) {
        dispatch!(self, c => c.write_rom(addr, val))
    }

    fn write_ram(&mut self, addr: u16, val: u8) -> bool {
        dispatch!(self, c => c.write_ram(addr, val))
    }

    fn save_data(&self) -> Vec<u8> {
        dispatch!(self, c => c.save_data())
    }

    fn load_save_data(&mut self, data: &[u8]) {
        dispatch!(self, c => c.load_save_data(data))
    }
}

/// Reads byte `addr` of a 16 KiB window mapped to `bank`, wrapping the bank
/// number to the ROM size.
fn rom_byte(rom: &[u8], bank: usize, addr: u16) -> u8 {
    let banks = (rom.len() / ROM_BANK_SIZE).max(1);
    let offset = (bank % banks) * ROM_BANK_SIZE + (usize::from(addr) & (ROM_BANK_SIZE - 1));
    rom.get(offset).copied().unwrap_or(0xFF)
}

/// Offset into external RAM for `addr` in bank `bank`, or `None` when the
/// cartridge has no RAM.
fn ram_index(ram_len: usize, bank: usize, addr: u16) -> Option<usize> {
    if ram_len == 0 {
        return None;
    }
    let banks = (ram_len / RAM_BANK_SIZE).max(1);
    let offset = (bank % banks) * RAM_BANK_SIZE + (usize::from(addr) & (RAM_BANK_SIZE - 1));
    Some(offset % ram_len)
}

/// A loaded cartridge: header, banking controller and battery persistence.
pub struct Cartridge {
    controller: Controller,
    header: Header,
    save_path: Option<PathBuf>,
    flusher: Option<SaveFlusher>,
    dirty: bool,
}

impl Cartridge {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        Self::from_file_with_interval(path, DEFAULT_SAVE_INTERVAL)
    }

    /// Loads a ROM (or a single-file zip holding one). Battery-backed
    /// cartridges restore `<rom>.sav` and start a background flusher writing
    /// back every `save_interval`.
    pub fn from_file_with_interval<P: AsRef<Path>>(
        path: P,
        save_interval: Duration,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let rom = load_rom_data(path)?;
        let mut cart = Self::from_bytes(rom)?;

        if cart.header.has_battery() {
            let save_path = path.with_extension("sav");
            match fs::read(&save_path) {
                Ok(data) => {
                    debug!("Loaded {} bytes of save data from {}", data.len(), save_path.display());
                    cart.controller.load_save_data(&data);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not read save file {}: {e}", save_path.display()),
            }
            cart.flusher = Some(SaveFlusher::spawn(save_path.clone(), save_interval));
            cart.save_path = Some(save_path);
        }

        Ok(cart)
    }

    /// Builds a cartridge from a ROM image without any file persistence.
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, LoadError> {
        let header = Header::parse(&rom)?;
        let controller = Controller::for_header(&header, rom);
        info!(
            "Loaded cartridge \"{}\" ({:?}, type {:#04X}, CGB support: {})",
            header.title,
            controller.kind(),
            header.cart_type,
            header.mode.supports_cgb()
        );
        Ok(Self {
            controller,
            header,
            save_path: None,
            flusher: None,
            dirty: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn mode(&self) -> CartMode {
        self.header.mode
    }

    pub fn mbc_type(&self) -> MbcType {
        self.controller.kind()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn has_battery(&self) -> bool {
        self.header.has_battery()
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.controller.read(addr)
    }

    #[inline]
    pub fn write_rom(&mut self, addr: u16, val: u8) {
        self.controller.write_rom(addr, val);
    }

    #[inline]
    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if self.controller.write_ram(addr, val) && self.header.has_battery() {
            self.dirty = true;
        }
    }

    pub fn save_data(&self) -> Vec<u8> {
        self.controller.save_data()
    }

    pub fn load_save_data(&mut self, data: &[u8]) {
        self.controller.load_save_data(data);
    }

    pub fn step_rtc(&mut self, cycles: u32) {
        if let Controller::Mbc3(mbc) = &mut self.controller {
            if mbc.step_rtc(cycles) && self.header.has_battery() {
                self.dirty = true;
            }
        }
    }

    /// Hands the current save data to the background flusher if it changed
    /// since the last hand-off. Never blocks.
    pub fn publish_save(&mut self) {
        if !self.dirty {
            return;
        }
        if let Some(flusher) = &self.flusher {
            if flusher.publish(self.controller.save_data()) {
                self.dirty = false;
            }
        }
    }

    /// Writes the save file synchronously.
    pub fn save(&mut self) -> io::Result<()> {
        if let Some(path) = &self.save_path {
            write_save(path, &self.controller.save_data())?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("header", &self.header)
            .field("mbc", &self.controller.kind())
            .field("save_path", &self.save_path)
            .finish()
    }
}

/// Reads a ROM image from disk. A `.zip` must contain exactly one file, which
/// is used as the ROM.
pub fn load_rom_data(path: &Path) -> Result<Vec<u8>, LoadError> {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Ok(fs::read(path)?);
    }

    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    if archive.len() != 1 {
        return Err(LoadError::ZipEntryCount(archive.len()));
    }
    let mut entry = archive.by_index(0)?;
    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_type(cart_type: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x147] = cart_type;
        rom
    }

    #[test]
    fn type_byte_selects_controller() {
        let cases = [
            (0x00, MbcType::RomOnly),
            (0x01, MbcType::Mbc1),
            (0x03, MbcType::Mbc1),
            (0x06, MbcType::Mbc2),
            (0x0F, MbcType::Mbc3),
            (0x13, MbcType::Mbc3),
            (0x1B, MbcType::Mbc5),
            (0x1E, MbcType::Mbc5),
        ];
        for (ty, expected) in cases {
            let cart = Cartridge::from_bytes(rom_with_type(ty)).unwrap();
            assert_eq!(cart.mbc_type(), expected, "type {ty:#04X}");
        }
    }

    #[test]
    fn unsupported_types_fall_back_to_mbc1() {
        for ty in [0x16, 0xFC, 0xFE, 0xFF] {
            let cart = Cartridge::from_bytes(rom_with_type(ty)).unwrap();
            assert_eq!(cart.mbc_type(), MbcType::Mbc1, "type {ty:#04X}");
        }
    }

    #[test]
    fn out_of_range_reads_never_panic() {
        let mut cart = Cartridge::from_bytes(rom_with_type(0x1B)).unwrap();
        cart.write_rom(0x2000, 0xFF);
        cart.write_rom(0x3000, 0x01);
        cart.write_rom(0x0000, 0x0A);
        cart.write_rom(0x4000, 0x0F);
        cart.write_ram(0xBFFF, 0x12);
        let _ = cart.read(0x7FFF);
        assert_eq!(cart.read(0xBFFF), 0xFF);
    }

    #[test]
    fn only_accepted_ram_writes_mark_save_dirty() {
        let mut rom = rom_with_type(0x03);
        rom[0x149] = 0x02;
        let mut cart = Cartridge::from_bytes(rom).unwrap();

        cart.write_ram(0xA000, 0x12);
        assert!(!cart.dirty, "write with RAM disabled");
        assert_eq!(cart.read(0xA000), 0xFF);

        cart.write_rom(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x12);
        assert!(cart.dirty);
        assert_eq!(cart.read(0xA000), 0x12);
    }

    #[test]
    fn ram_writes_without_battery_stay_clean() {
        let mut rom = rom_with_type(0x02);
        rom[0x149] = 0x02;
        let mut cart = Cartridge::from_bytes(rom).unwrap();
        cart.write_rom(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x34);
        assert!(!cart.dirty);
        assert_eq!(cart.read(0xA000), 0x34);
    }

    #[test]
    fn ram_index_wraps_small_ram() {
        assert_eq!(ram_index(0x800, 0, 0xA800), Some(0));
        assert_eq!(ram_index(0x2000, 3, 0xA001), Some(1));
        assert_eq!(ram_index(0, 0, 0xA000), None);
    }
}
