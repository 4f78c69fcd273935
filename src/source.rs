//! Memory source selection.
//!
//! The exporter reads live memory through `/proc` and `/dev/mem` unless a
//! synthetic layout is configured with `test_data_file`, in which case the
//! layout file drives everything, including the huge page size.

use anyhow::{bail, Context};
use herakles_thp_exporter::memory::linux::detect_block_pages;
use herakles_thp_exporter::scan::DEFAULT_BLOCK_PAGES;
use herakles_thp_exporter::{LinuxMemory, PhysicalMemory, SyntheticMemory};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// An opened memory source plus the huge page size the scan must use.
pub struct MemorySource {
    pub memory: Arc<dyn PhysicalMemory>,
    pub block_pages: u64,
}

pub fn open_memory_source(config: &Config) -> anyhow::Result<MemorySource> {
    if let Some(path) = &config.test_data_file {
        info!("Using synthetic memory layout from: {}", path.display());
        let memory = SyntheticMemory::load(path)
            .with_context(|| format!("failed to load synthetic layout {}", path.display()))?;
        let block_pages = memory.block_pages();
        if let Some(pinned) = config.block_pages {
            if pinned != block_pages {
                bail!(
                    "block_pages {} conflicts with the layout's {} pages per block",
                    pinned,
                    block_pages
                );
            }
        }
        return Ok(MemorySource {
            memory: Arc::new(memory),
            block_pages,
        });
    }

    let detected = detect_block_pages();
    let block_pages = config
        .block_pages
        .or(detected)
        .unwrap_or(DEFAULT_BLOCK_PAGES);
    if detected.is_none() && config.block_pages.is_none() {
        warn!(
            "Could not detect the huge page size, assuming {} pages per block",
            DEFAULT_BLOCK_PAGES
        );
    }

    let memory = LinuxMemory::open(block_pages).context("failed to open live memory source")?;
    Ok(MemorySource {
        memory: Arc::new(memory),
        block_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_thp_exporter::SyntheticLayout;

    #[test]
    fn test_synthetic_source_reports_layout_block_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let mut layout = SyntheticLayout::new(64, 8);
        layout.region(0, 0, 16, true).block(0, 4);
        layout.save(&path).unwrap();

        let config = Config {
            test_data_file: Some(path),
            ..Config::default()
        };
        let source = open_memory_source(&config).unwrap();
        assert_eq!(source.memory.name(), "synthetic");
        assert_eq!(source.block_pages, 8);
    }

    #[test]
    fn test_conflicting_block_pages_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.yaml");
        let mut layout = SyntheticLayout::new(64, 8);
        layout.region(0, 0, 16, true);
        layout.save(&path).unwrap();

        let config = Config {
            test_data_file: Some(path),
            block_pages: Some(512),
            ..Config::default()
        };
        assert!(open_memory_source(&config).is_err());
    }

    #[test]
    fn test_missing_layout_is_an_error() {
        let config = Config {
            test_data_file: Some("/nonexistent/layout.yaml".into()),
            ..Config::default()
        };
        let err = open_memory_source(&config).err().unwrap();
        assert!(err.to_string().contains("synthetic layout"));
    }
}
