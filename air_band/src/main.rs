//! air_band: interactive entry point.

use std::path::PathBuf;

use air_band::app::{run, run_headless, AppConfig, AppError, SourceKind};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "air_band", about = "Play drums, bass, guitar and cymbal with hand gestures")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the config file and use built-in defaults plus flags
    #[arg(long)]
    quick: bool,

    /// Where landmark frames come from
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Landmark file for `--source json` (stdin when omitted)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Run without a window (json and leap sources only)
    #[arg(long)]
    headless: bool,

    /// Directory holding the WAV sound bank (generated when incomplete)
    #[arg(long)]
    sound_dir: Option<PathBuf>,

    /// Sample rate used when the sound bank has to be generated
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Seconds between two triggers of the same sound
    #[arg(long)]
    cooldown: Option<f64>,

    /// Mirror landmarks horizontally (selfie view)
    #[arg(long)]
    mirror: bool,

    /// Minimum detector confidence for a hand to count
    #[arg(long)]
    min_confidence: Option<f32>,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig, AppError> {
        let mut cfg = match (&self.config, self.quick) {
            (Some(path), false) => AppConfig::load(path)?,
            _                   => AppConfig::default(),
        };
        if let Some(s) = self.source         { cfg.source = s; }
        if let Some(p) = self.input          { cfg.input = Some(p); }
        if let Some(d) = self.sound_dir      { cfg.sound_dir = d; }
        if let Some(r) = self.sample_rate    { cfg.sample_rate = r; }
        if let Some(c) = self.cooldown       { cfg.cooldown_secs = c; }
        if let Some(m) = self.min_confidence { cfg.min_confidence = m; }
        cfg.mirror   |= self.mirror;
        cfg.headless |= self.headless;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let result = Cli::parse().into_config().and_then(|cfg| {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║          AirBand: play the band with your bare hands         ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        match cfg.source {
            SourceKind::Sim  => println!("  Mode: Keyboard simulation  (--source json|leap for real hands)"),
            SourceKind::Json => println!("  Mode: JSON landmark stream"),
            SourceKind::Leap => println!("  Mode: LeapMotion hardware"),
        }
        println!();

        if cfg.headless { run_headless(cfg) } else { run(cfg) }
    });

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
