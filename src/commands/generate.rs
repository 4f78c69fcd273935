//! Generate testdata command implementation.
//!
//! Writes a random synthetic memory layout that `--test-data-file` can
//! replay in place of `/dev/mem`.

use chrono::Utc;
use herakles_thp_exporter::SyntheticLayout;
use rand::Rng;
use std::path::PathBuf;
use tracing::debug;

/// Base page size written into generated layouts.
const GENERATED_PAGE_SIZE: usize = 4096;

/// Gap between generated regions, in blocks.
const REGION_GAP_BLOCKS: u64 = 4;

/// Share of block slots left without a resident page.
const ABSENT_RATIO: f64 = 0.25;

/// Share of resident slots that are not huge pages.
const INELIGIBLE_RATIO: f64 = 0.15;

/// Parameters for [`generate_layout`].
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub nodes: u32,
    pub regions_per_node: usize,
    pub blocks_per_region: u64,
    pub block_pages: u64,
}

/// Generates a synthetic memory layout file for testing purposes.
pub fn command_generate_testdata(
    output: PathBuf,
    options: GenerateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!("Generating synthetic layout {:?} into {}", options, output.display());

    if options.block_pages == 0 {
        return Err("block_pages must be greater than 0".into());
    }

    let mut rng = rand::thread_rng();
    let layout = generate_layout(&mut rng, options);
    layout.save(&output)?;

    let regions: usize = layout.nodes.iter().map(|n| n.regions.len()).sum();
    println!(
        "✅ Generated synthetic layout: {} nodes, {} regions, {} classifiable huge pages in {}",
        layout.nodes.len(),
        regions,
        layout.classifiable_blocks(),
        output.display()
    );

    Ok(())
}

/// Builds a random layout. Utilization is skewed towards fully used huge
/// pages, with a tail of nearly empty ones, like a typical long-running host.
pub fn generate_layout(rng: &mut impl Rng, options: GenerateOptions) -> SyntheticLayout {
    let block_pages = options.block_pages;
    let mut layout = SyntheticLayout::new(GENERATED_PAGE_SIZE, block_pages);
    layout.generated_at = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    let mut next_start = 0u64;
    for node in 0..options.nodes {
        for _ in 0..options.regions_per_node {
            let start = next_start;
            let end = start + options.blocks_per_region * block_pages;
            next_start = end + REGION_GAP_BLOCKS * block_pages;

            // Roughly one region in ten is offline
            let manageable = !rng.gen_bool(0.1);
            layout.region(node, start, end, manageable);

            for slot in 0..options.blocks_per_region {
                let pfn = start + slot * block_pages;
                if rng.gen_bool(ABSENT_RATIO) {
                    continue;
                }
                if rng.gen_bool(INELIGIBLE_RATIO) {
                    layout.ineligible(pfn);
                    continue;
                }
                let utilized = random_utilization(rng, block_pages);
                layout.block(pfn, utilized);
            }
        }
    }

    layout
}

fn random_utilization(rng: &mut impl Rng, block_pages: u64) -> u64 {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll < 0.6 {
        block_pages
    } else if roll < 0.8 {
        rng.gen_range(block_pages / 2..=block_pages)
    } else {
        rng.gen_range(0..=block_pages / 2)
    }
}
