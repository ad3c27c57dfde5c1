use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

static INIT: OnceCell<()> = OnceCell::new();

const TEST_ROM_BUNDLE: &str =
    "https://github.com/c-sp/game-boy-test-roms/releases/download/v7.0/game-boy-test-roms-v7.0.zip";

fn ensure_test_roms() {
    INIT.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms");
        fs::create_dir_all(&dir).expect("failed to create test_roms directory");
        if dir.join("blargg").exists() {
            return;
        }

        // ROM binaries are not checked in; fetch the public bundle on demand.
        let resp = reqwest::blocking::get(TEST_ROM_BUNDLE).expect("failed to download test roms");
        let status = resp.status();
        if !status.is_success() {
            panic!("failed to download test roms: {status}");
        }
        let bytes = resp.bytes().expect("failed to read rom bytes");
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .expect("failed to open zip archive");
        archive.extract(&dir).expect("failed to extract test roms");
    });
}

#[allow(dead_code)]
pub fn rom_path<P: AsRef<Path>>(relative: P) -> PathBuf {
    ensure_test_roms();
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_roms")
        .join(relative)
}

/// A ROM image with a valid header and `banks` 16 KiB banks. The first byte
/// of every bank past 0 holds its bank number.
#[allow(dead_code)]
pub fn banked_rom(cart_type: u8, banks: usize, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0; banks * 0x4000];
    rom[0x134..0x13C].copy_from_slice(b"DOTMTRIX");
    rom[0x147] = cart_type;
    rom[0x148] = banks.trailing_zeros().saturating_sub(1) as u8;
    rom[0x149] = ram_code;
    for bank in 1..banks {
        rom[bank * 0x4000] = bank as u8;
        rom[bank * 0x4000 + 1] = (bank >> 8) as u8;
    }
    rom
}

/// A 32 KiB ROM-only image with `program` at the entry point.
#[allow(dead_code)]
pub fn program_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = banked_rom(0x00, 2, 0);
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}
