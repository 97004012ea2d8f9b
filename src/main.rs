mod frontend;

use clap::Parser;
use dmg_emu::config::Config;
use dmg_emu::driver::{self, FsSaveStore};
use dmg_emu::ppu::Rgb;
use frontend::MinifbFrontend;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// A DMG (original Game Boy) emulator core with a minifb frontend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the ROM image (.gb).
    rom: PathBuf,

    /// Directory to read/write the .sav file in. Defaults to the ROM's directory.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Path to a JSON config file (window scale, key bindings, palette).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Integer window scale, overriding the config file's value.
    #[arg(long)]
    scale: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let save_dir = args
        .save_dir
        .or_else(|| args.rom.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = args
        .config
        .map(|p| Config::load_or_default(&p))
        .unwrap_or_default();
    if let Some(scale) = args.scale {
        config.window_scale = scale;
    }

    let title = args
        .rom
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dmg_emu".to_string());

    let mut frontend = MinifbFrontend::new(&title, &config);
    let save_store = FsSaveStore::new(save_dir);
    let display_palette = config.palette.map(|p| Rgb(p.0, p.1, p.2));

    let result = driver::run(
        &args.rom,
        &save_store,
        &mut frontend,
        Duration::from_millis(16),
        display_palette,
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
