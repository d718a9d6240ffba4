//! biopulse - headless ECG/EEG monitor
//!
//! Feeds a simulated two-channel front end through the fixed-rate processing
//! chain and logs heart rate, RR intervals and EEG band powers.

mod cli;
mod monitor;

use anyhow::{Context, Result};
use biopulse_dsp::{AnalysisMode, MonitorConfig};
use biopulse_simulation::EegPattern;
use clap::Parser;
use cli::{Cli, Command, ConfigArgs, EegPreset, RunArgs};
use monitor::RunOptions;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Config(args) => print_config(args),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if args.deferred_fft {
        config.scheduler.analysis_mode = AnalysisMode::Deferred;
    }

    info!(
        "biopulse v{} - {} at {}Hz",
        env!("CARGO_PKG_VERSION"),
        config.name,
        config.sample_rate_hz
    );

    let options = RunOptions {
        seconds: args.seconds,
        realtime: args.realtime,
        heart_bpm: args.heart_bpm,
        noise_std: args.noise,
        mains_hum: args.mains_hum,
        eeg: match args.eeg {
            EegPreset::Relaxed => EegPattern::relaxed(),
            EegPreset::Focused => EegPattern::focused(),
        },
        seed: args.seed,
    };

    let summary = monitor::run(&config, &options).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        print!("{}", summary);
    }
    Ok(())
}

fn print_config(args: ConfigArgs) -> Result<()> {
    let config = MonitorConfig::for_mains(args.preset)?;
    let json = config.to_json()?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Configuration written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
