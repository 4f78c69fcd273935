//! Startup requirement validation for herakles-thp-exporter.
//!
//! This module validates that the exporter can reach the kernel interfaces
//! the live memory source reads before the sampler starts.

use herakles_thp_exporter::memory::linux::{
    DEV_MEM_PATH, HPAGE_PMD_SIZE_PATH, KPAGEFLAGS_PATH, ZONEINFO_PATH,
};
use nix::unistd::geteuid;
use std::fs::{self, File};
use tracing::{debug, error, info, warn};

pub const THP_ENABLED_PATH: &str = "/sys/kernel/mm/transparent_hugepage/enabled";

/// Validate all runtime requirements for scanning live memory.
pub fn validate_requirements() -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges()?;
    check_readable(ZONEINFO_PATH)?;
    check_readable(KPAGEFLAGS_PATH)?;
    check_readable(DEV_MEM_PATH)?;
    check_thp_mode();

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() -> Result<(), ValidationError> {
    if !geteuid().is_root() {
        error!("❌ Not running as root");
        error!("   /proc/kpageflags and /dev/mem are only readable by root");
        return Err(ValidationError::InsufficientPermissions(
            "root privileges are required to read physical memory".to_string(),
        ));
    }
    info!("✅ Running as root (uid=0)");
    Ok(())
}

/// Opens `path` for reading without consuming it.
fn check_readable(path: &str) -> Result<(), ValidationError> {
    match File::open(path) {
        Ok(_) => {
            info!("✅ {} is readable", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot open {} - insufficient permissions", path);
            if path == DEV_MEM_PATH {
                error!("   Kernels built with CONFIG_STRICT_DEVMEM or booted with");
                error!("   lockdown enabled refuse /dev/mem reads of RAM.");
            }
            Err(ValidationError::InsufficientPermissions(format!(
                "{}: {}",
                path, e
            )))
        }
        Err(e) => {
            error!("❌ Cannot open {}: {}", path, e);
            Err(ValidationError::InterfaceUnavailable {
                path: path.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Reports the THP mode. Never fatal: with THP disabled every bucket stays
/// at zero, which is still a correct report.
fn check_thp_mode() {
    match fs::read_to_string(THP_ENABLED_PATH) {
        Ok(mode) if mode.contains("[never]") => {
            warn!("⚠️  Transparent huge pages are disabled ({})", mode.trim());
            warn!("   The utilization histogram will stay empty");
        }
        Ok(mode) => info!("✅ THP mode: {}", mode.trim()),
        Err(e) => warn!("⚠️  Could not read {}: {}", THP_ENABLED_PATH, e),
    }

    match fs::read_to_string(HPAGE_PMD_SIZE_PATH) {
        Ok(size) => debug!("PMD huge page size: {} bytes", size.trim()),
        Err(e) => debug!("Could not read {}: {}", HPAGE_PMD_SIZE_PATH, e),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Kernel interface {path} unavailable: {reason}")]
    InterfaceUnavailable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interface_is_reported() {
        let err = check_readable("/nonexistent/kpageflags").unwrap_err();
        match err {
            ValidationError::InterfaceUnavailable { path, .. } => {
                assert_eq!(path, "/nonexistent/kpageflags")
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
