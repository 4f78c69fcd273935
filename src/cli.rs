//! CLI arguments and subcommands for herakles-thp-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-thp-exporter",
    about = "Transparent huge page utilization sampler and exporter",
    long_about = "Transparent huge page utilization sampler and exporter.\n\n\
                  Walks physical memory in small chunks, counts the zero-filled base pages \
                  inside every anonymous transparent huge page, and publishes a utilization \
                  histogram once per complete sweep, as text and as Prometheus metrics.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now | Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (default: from config, else info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Milliseconds between scan ticks
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Candidate block positions examined per tick
    #[arg(long)]
    pub scan_chunk: Option<usize>,

    /// Base pages per huge page (default: detected from the kernel, else 512)
    #[arg(long)]
    pub block_pages: Option<u64>,

    /// Number of utilization buckets
    #[arg(long)]
    pub bucket_count: Option<usize>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal sampler_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Path to a synthetic memory layout (JSON/YAML) used instead of /dev/mem
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check physical memory access (/proc/kpageflags, /dev/mem)
        #[arg(long)]
        memory: bool,

        /// Check /proc/zoneinfo
        #[arg(long)]
        proc: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run complete sweeps synchronously and print the report
    Test {
        /// Number of sweeps
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print per-sweep scan counters
        #[arg(long)]
        verbose: bool,
    },

    /// Generate a synthetic memory layout file
    GenerateTestdata {
        /// Output file path (.json for JSON, anything else for YAML)
        #[arg(short = 'o', long, default_value = "thp-testdata.json")]
        output: PathBuf,

        /// Number of memory nodes
        #[arg(long, default_value_t = 2)]
        nodes: u32,

        /// Regions per node
        #[arg(long, default_value_t = 2)]
        regions_per_node: usize,

        /// Huge page slots per region
        #[arg(long, default_value_t = 64)]
        blocks_per_region: u64,

        /// Base pages per huge page
        #[arg(long, default_value_t = 512)]
        block_pages: u64,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry_overrides() {
        let args = Args::parse_from([
            "herakles-thp-exporter",
            "--interval-ms",
            "250",
            "--scan-chunk",
            "64",
            "--block-pages",
            "8",
        ]);
        assert_eq!(args.interval_ms, Some(250));
        assert_eq!(args.scan_chunk, Some(64));
        assert_eq!(args.block_pages, Some(8));
        assert!(args.bucket_count.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_test_subcommand() {
        let args = Args::parse_from(["herakles-thp-exporter", "test", "-n", "3"]);
        match args.command {
            Some(Commands::Test { iterations, verbose }) => {
                assert_eq!(iterations, 3);
                assert!(!verbose);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
