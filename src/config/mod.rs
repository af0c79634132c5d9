//! CLI parsing and runtime settings

pub mod cli;
pub mod settings;

pub use cli::Cli;
pub use settings::Settings;
