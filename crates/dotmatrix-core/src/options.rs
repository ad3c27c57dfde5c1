use std::fmt;
use std::time::Duration;

use crate::{cartridge::DEFAULT_SAVE_INTERVAL, ppu::DmgPalette, serial::TransferCallback};

/// Construction options for [`GameBoy`](crate::GameBoy).
///
/// ```
/// use dotmatrix_core::GameBoyOptions;
///
/// let options = GameBoyOptions::default().with_cgb(true).with_sound(true);
/// assert!(options.cgb);
/// ```
pub struct GameBoyOptions {
    /// Request CGB mode. Only honoured when the cartridge supports it.
    pub cgb: bool,
    /// Generate audio samples.
    pub sound: bool,
    pub palette: DmgPalette,
    /// How often battery RAM is flushed to the `.sav` file.
    pub save_interval: Duration,
    pub transfer_callback: Option<TransferCallback>,
}

impl GameBoyOptions {
    pub fn with_cgb(mut self, cgb: bool) -> Self {
        self.cgb = cgb;
        self
    }

    pub fn with_sound(mut self, sound: bool) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_palette(mut self, palette: DmgPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Register a callback for every byte sent over the serial port.
    pub fn with_transfer_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.transfer_callback = Some(Box::new(callback));
        self
    }
}

impl Default for GameBoyOptions {
    fn default() -> Self {
        Self {
            cgb: false,
            sound: false,
            palette: DmgPalette::default(),
            save_interval: DEFAULT_SAVE_INTERVAL,
            transfer_callback: None,
        }
    }
}

impl fmt::Debug for GameBoyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameBoyOptions")
            .field("cgb", &self.cgb)
            .field("sound", &self.sound)
            .field("palette", &self.palette)
            .field("save_interval", &self.save_interval)
            .field("transfer_callback", &self.transfer_callback.is_some())
            .finish()
    }
}

/// Runtime switches for debugging output and layer visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// Log every executed instruction at `trace` level.
    pub output_opcodes: bool,
    pub hide_background: bool,
    pub hide_sprites: bool,
}
