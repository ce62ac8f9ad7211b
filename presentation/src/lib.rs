//! Presentation layer for toolgate
//!
//! This crate contains the CLI definition, the interactive confirmation
//! prompt and the response formatters.

pub mod cli;
pub mod confirmation;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use confirmation::interactive::InteractiveConfirmation;
pub use output::formatter::{ConsoleFormatter, JsonFormatter, OutputFormatter};
