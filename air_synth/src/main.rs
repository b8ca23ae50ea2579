//! make_sounds: synthesize the AirBand sound bank to WAV files.

use std::path::PathBuf;

use air_synth::{SoundBank, SoundId, DEFAULT_SAMPLE_RATE};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(name = "make_sounds", about = "Generate drum/bass/guitar/cymbal/chorus WAV files")]
struct Cli {
    /// Directory the WAV files are written into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Seed for the noise generator (drum, cymbal); random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let bank = match cli.seed {
        Some(seed) => SoundBank::synthesize_with_rng(cli.sample_rate, &mut StdRng::seed_from_u64(seed)),
        None       => SoundBank::synthesize(cli.sample_rate),
    };

    let result = bank.and_then(|bank| {
        bank.write_dir(&cli.out_dir)?;
        Ok(bank)
    });

    match result {
        Ok(bank) => {
            for sound in SoundId::ALL {
                let pcm = bank.get(sound);
                log::info!(
                    "{:<7} {:>7} samples  {:.2}s  peak {}",
                    sound, pcm.len(), pcm.duration_secs(), pcm.peak()
                );
            }
            println!("All sound files created successfully!");
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
