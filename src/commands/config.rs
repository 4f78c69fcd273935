//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-thp-exporter.yaml"),
    };

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles THP Exporter Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Scan Geometry and Pacing
# ------------------------
# interval_ms: 1000            # Delay between scan ticks
# scan_chunk: 256              # Huge page positions examined per tick
# block_pages: null            # Base pages per huge page (null = detect, else 512)
# bucket_count: 10             # Utilization buckets in the report
#
# Memory Source
# -------------
# test_data_file: null         # Synthetic layout (JSON/YAML) instead of /dev/mem
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Export herakles_thp_sampler_* metrics
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
