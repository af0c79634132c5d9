//! Runtime configuration settings

use std::path::PathBuf;

use crate::pipeline::AnalysisOptions;

/// Runtime settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Audio file to analyze (absent when only clearing the cache)
    pub input: Option<PathBuf>,
    /// Optional JSON output path
    pub output: Option<PathBuf>,
    /// Analysis toggles passed to the pipeline
    pub analysis: AnalysisOptions,
    /// Clear the cache instead of analyzing
    pub clear_cache: bool,
    /// Show progress bar and summary
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            analysis: AnalysisOptions {
                detect_chords: cli.chords,
                use_cache: !cli.no_cache,
                cache_dir: cli.cache_dir.clone(),
                ..AnalysisOptions::default()
            },
            clear_cache: cli.clear_cache,
            show_progress: !cli.quiet,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            analysis: AnalysisOptions::default(),
            clear_cache: false,
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn from_cli_wires_analysis_options() {
        let cli = crate::config::Cli::parse_from([
            "tracklens",
            "--chords",
            "--no-cache",
            "-q",
            "track.wav",
        ]);
        let settings = Settings::from_cli(&cli);
        assert!(settings.analysis.detect_chords);
        assert!(!settings.analysis.use_cache);
        assert!(!settings.show_progress);
        assert_eq!(settings.input, Some(PathBuf::from("track.wav")));
    }
}
