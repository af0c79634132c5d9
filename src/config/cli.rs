//! CLI argument parsing and configuration

use clap::Parser;
use std::path::PathBuf;

/// tracklens - Musician-friendly audio analysis
///
/// Analyzes an audio file and reports tempo, key, meter, song structure,
/// loudness, and optionally chords, each with a confidence score and a
/// plain-language explanation.
#[derive(Parser, Debug)]
#[command(name = "tracklens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Audio file to analyze (optional with --clear-cache)
    #[arg(value_name = "FILE", required_unless_present = "clear_cache")]
    pub input: Option<PathBuf>,

    /// Write the full analysis as JSON to this path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable chord detection (approximate, off by default)
    #[arg(long, default_value = "false")]
    pub chords: bool,

    /// Skip the result cache (force a fresh analysis)
    #[arg(long, default_value = "false")]
    pub no_cache: bool,

    /// Override the cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Clear the result cache and exit
    #[arg(long, default_value = "false")]
    pub clear_cache: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bar and summary)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
