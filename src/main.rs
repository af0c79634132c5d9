//! tracklens CLI entry point

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tracklens::cache::ResultCache;
use tracklens::config::{Cli, Settings};
use tracklens::pipeline::{self, AnalysisPipeline};
use tracklens::types::AudioFormat;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI
    let settings = Settings::from_cli(&cli);

    if settings.clear_cache {
        return clear_cache(&settings);
    }

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // clap enforces that input is present unless --clear-cache was given
    let Some(input) = settings.input.clone() else {
        eprintln!("Error: no input file given");
        return ExitCode::FAILURE;
    };

    let pipeline = match AnalysisPipeline::new(settings.analysis.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let progress_bar = if settings.show_progress {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {percent}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let report_bar = progress_bar.clone();
    let report = move |stage: &str, fraction: f32| {
        if let Some(pb) = &report_bar {
            pb.set_position((fraction * 100.0) as u64);
            pb.set_message(stage.to_string());
        }
    };

    let result = pipeline.analyze(&input, Some(&report), None);

    if let Some(pb) = &progress_bar {
        pb.finish_and_clear();
    }

    match result {
        Ok(result) => {
            if settings.show_progress {
                println!("{}", result.to_musician_summary());
            }

            if let Some(output) = &settings.output {
                if let Err(e) = pipeline::export_json(&result, output) {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
                if settings.show_progress {
                    println!();
                    println!("Wrote analysis to {}", output.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn clear_cache(settings: &Settings) -> ExitCode {
    let cache = match &settings.analysis.cache_dir {
        Some(dir) => ResultCache::open(dir),
        None => ResultCache::open_default(),
    };
    match cache.and_then(|c| c.clear()) {
        Ok(removed) => {
            println!("Removed {} cached result(s)", removed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    let Some(input) = &cli.input else {
        return Ok(());
    };

    if !input.exists() {
        return Err(format!(
            "Input file does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Example: tracklens ./track.mp3 -o analysis.json",
            input.display()
        ));
    }

    if input.is_dir() {
        return Err(format!(
            "Input is a directory: {}\n\n  Tip: tracklens analyzes one file at a time.",
            input.display()
        ));
    }

    if !AudioFormat::is_supported_path(input) {
        return Err(format!(
            "Unsupported file type: {}\n\n  Supported formats: MP3, WAV, FLAC, AAC, M4A",
            input.display()
        ));
    }

    if let Some(output) = &cli.output {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(format!(
                    "Output directory does not exist: {}\n\n  Tip: Create it first.\n  Example: mkdir -p {}",
                    parent.display(),
                    parent.display()
                ));
            }
        }
    }

    Ok(())
}
