//! Check command implementation.
//!
//! Validates system requirements and configuration.

use herakles_thp_exporter::memory::linux::{
    detect_block_pages, read_zoneinfo, DEV_MEM_PATH, KPAGEFLAGS_PATH, ZONEINFO_PATH,
};
use herakles_thp_exporter::SyntheticLayout;
use std::fs::File;
use std::path::Path;

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(
    memory: bool,
    proc: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles THP Exporter - System Check");
    println!("=======================================");

    let mut all_ok = true;

    // Check zone enumeration
    if proc || all {
        println!("\n📁 Checking {}...", ZONEINFO_PATH);
        match read_zoneinfo(Path::new(ZONEINFO_PATH)) {
            Ok(nodes) if nodes.is_empty() => {
                println!("   ❌ No memory zones found");
                all_ok = false;
            }
            Ok(nodes) => {
                let regions: usize = nodes.iter().map(|n| n.regions.len()).sum();
                let manageable = nodes
                    .iter()
                    .flat_map(|n| n.regions.iter())
                    .filter(|r| r.manageable)
                    .count();
                println!(
                    "   ✅ {} nodes, {} zones ({} with managed pages)",
                    nodes.len(),
                    regions,
                    manageable
                );
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    // Check physical memory access
    if memory || all {
        println!("\n💾 Checking physical memory access...");
        for path in [KPAGEFLAGS_PATH, DEV_MEM_PATH] {
            match File::open(path) {
                Ok(_) => println!("   ✅ {} readable", path),
                Err(e) => {
                    println!("   ❌ {}: {}", path, e);
                    all_ok = false;
                }
            }
        }
        match detect_block_pages() {
            Some(pages) => println!("   ✅ Huge page size: {} base pages", pages),
            None => println!("   ⚠️  Huge page size not exposed, 512 will be assumed"),
        }
    }

    // Check synthetic layout
    if let Some(path) = &config.test_data_file {
        println!("\n🧪 Checking synthetic layout {}...", path.display());
        match SyntheticLayout::load(path) {
            Ok(layout) => println!(
                "   ✅ {} nodes, {} classifiable huge pages",
                layout.nodes.len(),
                layout.classifiable_blocks()
            ),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
