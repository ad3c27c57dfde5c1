use std::path::{Path, PathBuf};

use dotmatrix_core::ppu::DmgPalette;
use log::warn;
use serde::{Deserialize, Serialize};

/// `Auto` runs CGB-capable cartridges in CGB mode; DMG-only cartridges
/// always run as DMG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmulationMode {
    #[default]
    Auto,
    ForceDmg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaletteName {
    Greyscale,
    Original,
    #[default]
    Bgb,
}

impl From<PaletteName> for DmgPalette {
    fn from(name: PaletteName) -> Self {
        match name {
            PaletteName::Greyscale => DmgPalette::Greyscale,
            PaletteName::Original => DmgPalette::Original,
            PaletteName::Bgb => DmgPalette::Bgb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CliConfig {
    pub emulation_mode: EmulationMode,
    pub palette: PaletteName,
    pub sound: bool,
    /// Frames to run before exiting.
    pub frames: u32,
    pub save_interval_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            emulation_mode: EmulationMode::Auto,
            palette: PaletteName::Bgb,
            sound: false,
            frames: 600,
            save_interval_ms: 1000,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotmatrix").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotmatrix")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

/// Missing or unreadable files give the defaults silently; a file that fails
/// to parse gives the defaults with a warning.
pub fn load_from_file(path: &Path) -> CliConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return CliConfig::default(),
    };

    match toml::from_str::<CliConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            CliConfig::default()
        }
    }
}
