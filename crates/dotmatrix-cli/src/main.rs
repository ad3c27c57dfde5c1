mod config;

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use dotmatrix_core::gameboy::FRAME_RATE;
use dotmatrix_core::options::DebugFlags;
use dotmatrix_core::ppu::{DmgPalette, Frame, SCREEN_HEIGHT, SCREEN_WIDTH};
use dotmatrix_core::{GameBoy, GameBoyOptions};
use log::{error, info, warn};

use crate::config::{CliConfig, EmulationMode};

#[derive(Parser)]
#[command(name = "dotmatrix", version, about = "Headless Game Boy / Game Boy Color emulator")]
struct Args {
    /// Path to ROM file (.gb, .gbc or a zip holding one)
    rom: PathBuf,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Request CGB mode (used when the cartridge supports it)
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Disable sound generation
    #[arg(long)]
    mute: bool,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u32>,

    /// DMG palette: greyscale, original or bgb
    #[arg(long)]
    palette: Option<DmgPalette>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Report emulation speed when done
    #[arg(long)]
    profile: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    match run(&args, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn build_options(args: &Args, cfg: &CliConfig) -> GameBoyOptions {
    let cgb = !args.dmg && (args.cgb || cfg.emulation_mode != EmulationMode::ForceDmg);
    GameBoyOptions::default()
        .with_cgb(cgb)
        .with_sound(cfg.sound && !args.mute)
        .with_palette(args.palette.unwrap_or(cfg.palette.into()))
        .with_save_interval(Duration::from_millis(cfg.save_interval_ms))
}

fn run(args: &Args, cfg: &CliConfig) -> Result<(), Box<dyn Error>> {
    let options = build_options(args, cfg).with_transfer_callback(|byte| {
        let mut out = io::stdout().lock();
        let _ = out.write_all(&[byte]);
        if byte == b'\n' {
            let _ = out.flush();
        }
    });

    let mut gb = GameBoy::from_file(&args.rom, options)?;
    info!(
        "Running \"{}\" in {} mode",
        gb.cartridge_title(),
        if gb.is_cgb() { "CGB" } else { "DMG" }
    );
    gb.set_debug_flags(DebugFlags {
        output_opcodes: log::log_enabled!(log::Level::Trace),
        ..DebugFlags::default()
    });

    let frames = args.frames.unwrap_or(cfg.frames);
    let start = Instant::now();
    let mut frames_run = 0u32;
    let mut result = Ok(());
    while frames_run < frames {
        if let Err(e) = gb.update() {
            result = Err(e);
            break;
        }
        frames_run += 1;
    }
    let elapsed = start.elapsed();
    let _ = io::stdout().flush();

    if let Err(e) = gb.save() {
        warn!("Failed to write save file: {e}");
    }

    if args.profile {
        let emulated = f64::from(frames_run) / f64::from(FRAME_RATE);
        info!(
            "{frames_run} frames in {elapsed:.2?} ({:.1}x realtime)",
            emulated / elapsed.as_secs_f64().max(f64::EPSILON)
        );
    }

    if let Some(path) = &args.screenshot {
        write_png(path, gb.prepared_frame())?;
        info!("Wrote screenshot to {}", path.display());
    }

    result?;
    Ok(())
}

fn write_png(path: &Path, frame: &Frame) -> Result<(), Box<dyn Error>> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(file, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    let data: Vec<u8> = frame.iter().flatten().copied().collect();
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(())
}
