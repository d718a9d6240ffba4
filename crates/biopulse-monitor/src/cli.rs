use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "biopulse",
    version,
    about = "Real-time ECG heart rate and EEG band power monitor",
    long_about = "Runs the fixed-rate ECG/EEG processing chain on a simulated \
                  acquisition front end and logs beats, RR intervals and band powers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a simulated recording
    Run(RunArgs),
    /// Print a preset configuration as JSON
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON configuration file (defaults to the 50Hz preset)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds of signal to process
    #[arg(long, default_value_t = 30.0)]
    pub seconds: f32,

    /// Analyze EEG blocks in a separate task
    #[arg(long)]
    pub deferred_fft: bool,

    /// Pace samples at the acquisition rate instead of running flat out
    #[arg(long)]
    pub realtime: bool,

    /// Simulated heart rate
    #[arg(long, default_value_t = 75.0)]
    pub heart_bpm: f32,

    /// Gaussian noise standard deviation added to both channels
    #[arg(long, default_value_t = 0.0)]
    pub noise: f32,

    /// Mains hum amplitude added to both channels
    #[arg(long, default_value_t = 0.0)]
    pub mains_hum: f32,

    /// Simulated mental state on the EEG channel
    #[arg(long, value_enum, default_value_t = EegPreset::Relaxed)]
    pub eeg: EegPreset,

    /// Random seed for reproducible noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Mains frequency of the preset (50 or 60)
    #[arg(long, default_value_t = 50)]
    pub preset: u32,

    /// Write to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EegPreset {
    Relaxed,
    Focused,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "biopulse",
            "-vv",
            "run",
            "--seconds",
            "5",
            "--deferred-fft",
            "--heart-bpm",
            "60",
            "--eeg",
            "focused",
            "--seed",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.seconds, 5.0);
                assert!(args.deferred_fft);
                assert!(!args.realtime);
                assert_eq!(args.heart_bpm, 60.0);
                assert_eq!(args.eeg, EegPreset::Focused);
                assert_eq!(args.seed, Some(3));
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_arguments() {
        let cli = Cli::try_parse_from(["biopulse", "config", "--preset", "60"]).unwrap();
        match cli.command {
            Command::Config(args) => {
                assert_eq!(args.preset, 60);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
