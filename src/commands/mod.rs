//! CLI command implementations for herakles-thp-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `test`: Foreground sweeps with a printed report
//! - `generate`: Synthetic layout generation

pub mod check;
pub mod config;
pub mod generate;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::{command_generate_testdata, GenerateOptions};
pub use test::command_test;
