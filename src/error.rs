//! Unified error types for tracklens
//!
//! Error strategy:
//! - Per-method errors inside an analyzer: handled locally, the method is
//!   simply omitted from its ensemble
//! - Input errors (missing file, bad format, failed decode): recoverable
//! - System errors (output, config): fatal
//!
//! All errors include actionable suggestions where possible.

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AAC, M4A";

/// Top-level error type for tracklens operations
#[derive(Debug, Error)]
pub enum TracklensError {
    // =========================================================================
    // Recoverable errors - report and skip
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    #[error("Analysis cancelled")]
    Cancelled,

    // =========================================================================
    // Fatal errors
    // =========================================================================
    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tracklens operations
pub type Result<T> = std::result::Result<T, TracklensError>;

impl TracklensError {
    /// Returns true if this error is recoverable (skip file, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TracklensError::DecodeError { .. }
                | TracklensError::UnsupportedFormat { .. }
                | TracklensError::FileNotFound(_)
                | TracklensError::Cancelled
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TracklensError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!(
                    "Permission denied. Check that you have write access to {}",
                    path.display()
                )
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        TracklensError::OutputError { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let decode = TracklensError::decode_error("/tmp/x.mp3", "bad header");
        assert!(decode.is_recoverable());

        let output = TracklensError::OutputError {
            path: PathBuf::from("/tmp/out.json"),
            reason: "denied".into(),
        };
        assert!(!output.is_recoverable());
    }

    #[test]
    fn test_output_error_explains_missing_directory() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = TracklensError::output_error("/music/out/result.json", io);
        match err {
            TracklensError::OutputError { path, reason } => {
                assert_eq!(path, PathBuf::from("/music/out/result.json"));
                assert!(reason.contains("/music/out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
