//! Synthetic physical memory built from a declarative layout.
//!
//! A layout lists memory nodes, their regions and the large blocks resident
//! in each region. Every block declares which of its units are all-zero,
//! either explicitly (`zero_pages`) or through a utilization count
//! (`utilized`, in which case the trailing units are the zero ones).
//! Layouts load from JSON or YAML and are produced by `generate-testdata`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{BlockHandle, NodeRegions, PageHandle, PhysicalMemory, Region};
use crate::error::SamplerError;

/// Layout format version written by this crate.
pub const LAYOUT_VERSION: &str = "1";

/// Byte written into non-zero units. Only the last byte of a unit is set so
/// that a classifier which stops early would miscount.
const FILL_BYTE: u8 = 0x5a;

fn default_version() -> String {
    LAYOUT_VERSION.to_string()
}
fn default_page_size() -> usize {
    4096
}
fn default_true() -> bool {
    true
}

/// One resident large block inside a synthetic region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticBlock {
    pub pfn: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilized: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zero_pages: Vec<u64>,
    /// Resident but not a content-bearing composite block when false.
    #[serde(default = "default_true")]
    pub eligible: bool,
    /// Every unit read fails when true.
    #[serde(default)]
    pub unreadable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticRegion {
    pub start: u64,
    pub end: u64,
    #[serde(default = "default_true")]
    pub manageable: bool,
    #[serde(default)]
    pub blocks: Vec<SyntheticBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticNode {
    pub node: u32,
    #[serde(default)]
    pub regions: Vec<SyntheticRegion>,
}

/// Root structure of a synthetic layout file.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct SyntheticLayout {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub block_pages: u64,
    #[serde(default)]
    pub nodes: Vec<SyntheticNode>,
    /// `(node index, region index)` of the region the builder last added.
    #[serde(skip)]
    last_region: Option<(usize, usize)>,
}

// The builder position is not part of the layout.
impl PartialEq for SyntheticLayout {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.generated_at == other.generated_at
            && self.page_size == other.page_size
            && self.block_pages == other.block_pages
            && self.nodes == other.nodes
    }
}

impl SyntheticLayout {
    pub fn new(page_size: usize, block_pages: u64) -> Self {
        Self {
            version: default_version(),
            generated_at: String::new(),
            page_size,
            block_pages,
            nodes: Vec::new(),
            last_region: None,
        }
    }

    /// Appends a region to `node`, creating the node list on first use.
    pub fn region(&mut self, node: u32, start: u64, end: u64, manageable: bool) -> &mut Self {
        let region = SyntheticRegion {
            start,
            end,
            manageable,
            blocks: Vec::new(),
        };
        let node_idx = match self.nodes.iter().position(|n| n.node == node) {
            Some(idx) => idx,
            None => {
                self.nodes.push(SyntheticNode {
                    node,
                    regions: Vec::new(),
                });
                self.nodes.len() - 1
            }
        };
        let regions = &mut self.nodes[node_idx].regions;
        regions.push(region);
        self.last_region = Some((node_idx, regions.len() - 1));
        self
    }

    /// Adds an eligible block with `utilized` non-zero units to the most
    /// recently added region.
    pub fn block(&mut self, pfn: u64, utilized: u64) -> &mut Self {
        self.push_block(SyntheticBlock {
            pfn,
            utilized: Some(utilized),
            zero_pages: Vec::new(),
            eligible: true,
            unreadable: false,
        })
    }

    /// Adds an eligible block whose listed units are all-zero.
    pub fn block_with_zero_pages(&mut self, pfn: u64, zero_pages: Vec<u64>) -> &mut Self {
        self.push_block(SyntheticBlock {
            pfn,
            utilized: None,
            zero_pages,
            eligible: true,
            unreadable: false,
        })
    }

    /// Adds a resident position that is not an eligible large block.
    pub fn ineligible(&mut self, pfn: u64) -> &mut Self {
        self.push_block(SyntheticBlock {
            pfn,
            utilized: Some(0),
            zero_pages: Vec::new(),
            eligible: false,
            unreadable: false,
        })
    }

    /// Adds an eligible block whose content cannot be read.
    pub fn unreadable(&mut self, pfn: u64) -> &mut Self {
        self.push_block(SyntheticBlock {
            pfn,
            utilized: Some(0),
            zero_pages: Vec::new(),
            eligible: true,
            unreadable: true,
        })
    }

    /// Adds `block` to the region most recently added through [`region`].
    /// Layouts that were loaded rather than built fall back to the last
    /// region of the last node.
    ///
    /// [`region`]: SyntheticLayout::region
    pub fn push_block(&mut self, block: SyntheticBlock) -> &mut Self {
        let target = match self.last_region {
            Some((node, region)) => self
                .nodes
                .get_mut(node)
                .and_then(|n| n.regions.get_mut(region)),
            None => self.nodes.last_mut().and_then(|n| n.regions.last_mut()),
        };
        if let Some(region) = target {
            region.blocks.push(block);
        }
        self
    }

    /// Number of blocks a full sweep should classify.
    pub fn classifiable_blocks(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.regions.iter())
            .filter(|r| r.manageable)
            .flat_map(|r| r.blocks.iter())
            .filter(|b| b.eligible && !b.unreadable)
            .count()
    }

    /// Loads a layout from JSON (`.json`) or YAML (anything else).
    pub fn load(path: &Path) -> Result<Self, SamplerError> {
        debug!("Loading synthetic layout from: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| SamplerError::io(path, e))?;

        let layout: SyntheticLayout = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| SamplerError::parse(path.display().to_string(), e))?,
            _ => serde_yaml::from_str(&content)
                .map_err(|e| SamplerError::parse(path.display().to_string(), e))?,
        };

        info!(
            "Loaded synthetic layout version {} with {} nodes from {}",
            layout.version,
            layout.nodes.len(),
            path.display()
        );
        Ok(layout)
    }

    /// Writes the layout as JSON (`.json`) or YAML (anything else).
    pub fn save(&self, path: &Path) -> Result<(), SamplerError> {
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| SamplerError::parse("synthetic layout", e))?,
            _ => serde_yaml::to_string(self)
                .map_err(|e| SamplerError::parse("synthetic layout", e))?,
        };
        fs::write(path, content).map_err(|e| SamplerError::io(path, e))
    }
}

struct BlockState {
    pages: u64,
    zero: BTreeSet<u64>,
    eligible: bool,
    unreadable: bool,
}

/// In-memory [`PhysicalMemory`] backed by a validated [`SyntheticLayout`].
pub struct SyntheticMemory {
    nodes: Vec<NodeRegions>,
    page_size: usize,
    block_pages: u64,
    blocks: BTreeMap<u64, BlockState>,
    reads: Mutex<BTreeMap<u64, u64>>,
}

impl SyntheticMemory {
    pub fn from_layout(layout: &SyntheticLayout) -> Result<Self, SamplerError> {
        if layout.page_size == 0 {
            return Err(SamplerError::Layout("page_size must be positive".into()));
        }
        if layout.block_pages == 0 {
            return Err(SamplerError::Layout("block_pages must be positive".into()));
        }

        let block_pages = layout.block_pages;
        let mut nodes = Vec::with_capacity(layout.nodes.len());
        let mut blocks = BTreeMap::new();

        for node in &layout.nodes {
            let mut regions = Vec::with_capacity(node.regions.len());
            for region in &node.regions {
                if region.start > region.end {
                    return Err(SamplerError::Layout(format!(
                        "node {} region {}-{} ends before it starts",
                        node.node, region.start, region.end
                    )));
                }
                for block in &region.blocks {
                    let state = block_state(block, region, block_pages)?;
                    if blocks.insert(block.pfn, state).is_some() {
                        return Err(SamplerError::Layout(format!(
                            "block at pfn {} declared twice",
                            block.pfn
                        )));
                    }
                }
                regions.push(Region::new(region.start, region.end, region.manageable));
            }
            nodes.push(NodeRegions {
                node: node.node,
                regions,
            });
        }

        Ok(Self {
            nodes,
            page_size: layout.page_size,
            block_pages,
            blocks,
            reads: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn load(path: &Path) -> Result<Self, SamplerError> {
        Self::from_layout(&SyntheticLayout::load(path)?)
    }

    pub fn block_pages(&self) -> u64 {
        self.block_pages
    }

    /// Head frame numbers of every block whose content has been read so far.
    pub fn blocks_read(&self) -> Vec<u64> {
        match self.reads.lock() {
            Ok(reads) => reads.keys().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn record_read(&self, pfn: u64) {
        if let Ok(mut reads) = self.reads.lock() {
            *reads.entry(pfn).or_insert(0) += 1;
        }
    }
}

fn block_state(
    block: &SyntheticBlock,
    region: &SyntheticRegion,
    block_pages: u64,
) -> Result<BlockState, SamplerError> {
    if block.pfn < region.start || block.pfn >= region.end {
        return Err(SamplerError::Layout(format!(
            "block at pfn {} lies outside region {}-{}",
            block.pfn, region.start, region.end
        )));
    }
    if block.pfn % block_pages != 0 {
        return Err(SamplerError::Layout(format!(
            "block at pfn {} is not aligned to {} pages",
            block.pfn, block_pages
        )));
    }

    let zero: BTreeSet<u64> = match (block.utilized, block.zero_pages.is_empty()) {
        (Some(_), false) => {
            return Err(SamplerError::Layout(format!(
                "block at pfn {} sets both utilized and zero_pages",
                block.pfn
            )));
        }
        (Some(utilized), true) => {
            if utilized > block_pages {
                return Err(SamplerError::Layout(format!(
                    "block at pfn {} has utilized {} above block size {}",
                    block.pfn, utilized, block_pages
                )));
            }
            (utilized..block_pages).collect()
        }
        (None, _) => {
            if let Some(bad) = block.zero_pages.iter().find(|&&i| i >= block_pages) {
                return Err(SamplerError::Layout(format!(
                    "block at pfn {} lists zero page {} outside the block",
                    block.pfn, bad
                )));
            }
            block.zero_pages.iter().copied().collect()
        }
    };

    Ok(BlockState {
        pages: block_pages,
        zero,
        eligible: block.eligible,
        unreadable: block.unreadable,
    })
}

impl PhysicalMemory for SyntheticMemory {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn nodes(&self) -> Result<Vec<NodeRegions>, SamplerError> {
        Ok(self.nodes.clone())
    }

    fn resident_page_at(&self, pfn: u64) -> Option<PageHandle> {
        self.blocks.contains_key(&pfn).then_some(PageHandle { pfn })
    }

    fn eligible_large_block(&self, page: PageHandle) -> Option<BlockHandle> {
        self.blocks
            .get(&page.pfn)
            .filter(|b| b.eligible)
            .map(|b| BlockHandle {
                head_pfn: page.pfn,
                pages: b.pages,
            })
    }

    fn read_unit(&self, block: BlockHandle, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let state = self
            .blocks
            .get(&block.head_pfn)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no block at pfn"))?;
        if index >= state.pages {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unit index outside block",
            ));
        }
        if state.unreadable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "synthetic block marked unreadable",
            ));
        }

        self.record_read(block.head_pfn);
        buf.fill(0);
        if !state.zero.contains(&index) {
            if let Some(last) = buf.last_mut() {
                *last = FILL_BYTE;
            }
        }
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
