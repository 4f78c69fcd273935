//! Configuration management for herakles-thp-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_thp_exporter::scan::{
    ScanGeometry, DEFAULT_BLOCK_PAGES, DEFAULT_BUCKET_COUNT, DEFAULT_INTERVAL_MS,
    DEFAULT_SCAN_CHUNK,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;

/// Exporter configuration. Every field is optional so a partial file only
/// overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Scan geometry and pacing
    #[serde(alias = "interval-ms")]
    pub interval_ms: Option<u64>,
    #[serde(alias = "scan-chunk")]
    pub scan_chunk: Option<usize>,
    /// Base pages per huge page; detected from the kernel when unset
    #[serde(alias = "block-pages")]
    pub block_pages: Option<u64>,
    #[serde(alias = "bucket-count")]
    pub bucket_count: Option<usize>,

    /// Synthetic memory layout used instead of /dev/mem
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            scan_chunk: Some(DEFAULT_SCAN_CHUNK),
            block_pages: None,
            bucket_count: Some(DEFAULT_BUCKET_COUNT),
            test_data_file: None,
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    /// Builds the scan geometry. `detected` is the huge page size reported by
    /// the memory source and is used only when the config leaves it unset.
    pub fn geometry(&self, detected: Option<u64>) -> ScanGeometry {
        ScanGeometry::new(
            self.block_pages
                .or(detected)
                .unwrap_or(DEFAULT_BLOCK_PAGES),
            self.bucket_count.unwrap_or(DEFAULT_BUCKET_COUNT),
            self.scan_chunk.unwrap_or(DEFAULT_SCAN_CHUNK),
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.interval_ms == Some(0) {
        return Err("interval_ms must be greater than 0".into());
    }

    // An unpinned block size is only known once the memory source is
    // opened, so bucket_count is checked against it when the engine is built.
    let mut geometry = cfg.geometry(None);
    if cfg.block_pages.is_none() {
        geometry.block_pages = geometry.block_pages.max(geometry.bucket_count as u64);
    }
    geometry.validate()?;

    if let Some(path) = &cfg.test_data_file {
        if !path.exists() {
            return Err(format!("Test data file not found: {}", path.display()).into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Geometry and pacing
    if args.interval_ms.is_some() {
        config.interval_ms = args.interval_ms;
    }
    if args.scan_chunk.is_some() {
        config.scan_chunk = args.scan_chunk;
    }
    if args.block_pages.is_some() {
        config.block_pages = args.block_pages;
    }
    if args.bucket_count.is_some() {
        config.bucket_count = args.bucket_count;
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // Test data file: CLI wins if provided
    if let Some(test_file) = &args.test_data_file {
        config.test_data_file = Some(test_file.clone());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/thp-exporter.yaml",
            "/etc/herakles/thp-exporter.yml",
            "/etc/herakles/thp-exporter.json",
            "./herakles-thp-exporter.yaml",
            "./herakles-thp-exporter.yml",
            "./herakles-thp-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}
