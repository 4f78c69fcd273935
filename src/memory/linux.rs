//! Live host memory access for Linux.
//!
//! Regions are the kernel's memory zones as listed in `/proc/zoneinfo`
//! (a zone is manageable when it has managed pages). Residency and
//! large-block eligibility come from the per-frame flags in
//! `/proc/kpageflags`, and unit content is read through `/dev/mem`.
//! All three require root; `/dev/mem` additionally needs a kernel built
//! without `CONFIG_STRICT_DEVMEM` for RAM above the first megabyte. Any
//! failed read marks that candidate as not applicable.

use once_cell::sync::Lazy;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{BlockHandle, NodeRegions, PageHandle, PhysicalMemory, Region};
use crate::error::SamplerError;

pub const ZONEINFO_PATH: &str = "/proc/zoneinfo";
pub const KPAGEFLAGS_PATH: &str = "/proc/kpageflags";
pub const DEV_MEM_PATH: &str = "/dev/mem";
pub const HPAGE_PMD_SIZE_PATH: &str = "/sys/kernel/mm/transparent_hugepage/hpage_pmd_size";

// Bit numbers from include/uapi/linux/kernel-page-flags.h
const KPF_ANON: u64 = 12;
const KPF_COMPOUND_HEAD: u64 = 15;
const KPF_COMPOUND_TAIL: u64 = 16;
const KPF_NOPAGE: u64 = 20;
const KPF_THP: u64 = 22;

const KPAGEFLAGS_ENTRY_SIZE: u64 = 8;

/// Get the system base page size in bytes.
fn get_page_size() -> usize {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE; -1 is handled below.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// System base page size in bytes.
pub static PAGE_SIZE: Lazy<usize> = Lazy::new(get_page_size);

fn has_flag(flags: u64, bit: u64) -> bool {
    flags & (1 << bit) != 0
}

/// Head frame of an anonymous transparent huge page.
fn is_thp_head(head: u64) -> bool {
    has_flag(head, KPF_ANON) && has_flag(head, KPF_THP) && has_flag(head, KPF_COMPOUND_HEAD)
}

/// Decides eligibility from the flags of a block's first and last frame.
///
/// The last frame must still be a tail of the same compound page, which
/// rules out smaller multi-size THPs that happen to be aligned.
pub fn is_eligible(head: u64, tail: u64) -> bool {
    is_thp_head(head) && has_flag(tail, KPF_COMPOUND_TAIL)
}

/// Number of base pages in a PMD-sized transparent huge page, if the kernel
/// exposes it.
pub fn detect_block_pages() -> Option<u64> {
    let content = fs::read_to_string(HPAGE_PMD_SIZE_PATH).ok()?;
    let bytes: u64 = content.trim().parse().ok()?;
    let pages = bytes / *PAGE_SIZE as u64;
    (pages > 0).then_some(pages)
}

/// [`PhysicalMemory`] backed by procfs and `/dev/mem`.
pub struct LinuxMemory {
    zoneinfo_path: PathBuf,
    kpageflags: File,
    mem: File,
    block_pages: u64,
}

impl LinuxMemory {
    pub fn open(block_pages: u64) -> Result<Self, SamplerError> {
        let kpageflags =
            File::open(KPAGEFLAGS_PATH).map_err(|e| SamplerError::io(KPAGEFLAGS_PATH, e))?;
        let mem = File::open(DEV_MEM_PATH).map_err(|e| SamplerError::io(DEV_MEM_PATH, e))?;

        info!(
            "Opened live memory source (page size {} bytes, {} pages per block)",
            *PAGE_SIZE, block_pages
        );

        Ok(Self {
            zoneinfo_path: PathBuf::from(ZONEINFO_PATH),
            kpageflags,
            mem,
            block_pages,
        })
    }

    fn page_flags(&self, pfn: u64) -> Option<u64> {
        let mut raw = [0u8; KPAGEFLAGS_ENTRY_SIZE as usize];
        let offset = pfn.checked_mul(KPAGEFLAGS_ENTRY_SIZE)?;
        self.kpageflags.read_exact_at(&mut raw, offset).ok()?;
        Some(u64::from_ne_bytes(raw))
    }
}

impl PhysicalMemory for LinuxMemory {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn nodes(&self) -> Result<Vec<NodeRegions>, SamplerError> {
        read_zoneinfo(&self.zoneinfo_path)
    }

    fn resident_page_at(&self, pfn: u64) -> Option<PageHandle> {
        let flags = self.page_flags(pfn)?;
        (!has_flag(flags, KPF_NOPAGE)).then_some(PageHandle { pfn })
    }

    fn eligible_large_block(&self, page: PageHandle) -> Option<BlockHandle> {
        let head = self.page_flags(page.pfn)?;
        if !is_thp_head(head) {
            return None;
        }

        let tail = self.page_flags(page.pfn + self.block_pages - 1)?;
        if !is_eligible(head, tail) {
            return None;
        }

        Some(BlockHandle {
            head_pfn: page.pfn,
            pages: self.block_pages,
        })
    }

    fn read_unit(&self, block: BlockHandle, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let offset = (block.head_pfn + index)
            .checked_mul(*PAGE_SIZE as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset overflow"))?;
        self.mem.read_exact_at(buf, offset)
    }

    fn page_size(&self) -> usize {
        *PAGE_SIZE
    }
}

/// Reads and parses a zoneinfo file into node region lists.
pub fn read_zoneinfo(path: &Path) -> Result<Vec<NodeRegions>, SamplerError> {
    let content = fs::read_to_string(path).map_err(|e| SamplerError::io(path, e))?;
    parse_zoneinfo(&content)
}

#[derive(Default)]
struct ZoneFields {
    node: u32,
    name: String,
    spanned: Option<u64>,
    managed: Option<u64>,
    start_pfn: Option<u64>,
}

impl ZoneFields {
    fn into_region(self) -> Result<(u32, Region), SamplerError> {
        let spanned = self.spanned.unwrap_or(0);
        let start = match self.start_pfn {
            Some(start) => start,
            // Unpopulated zones end their block before start_pfn
            None if spanned == 0 => 0,
            None => {
                return Err(SamplerError::parse(
                    "zoneinfo",
                    format!("zone {} on node {} has no start_pfn", self.name, self.node),
                ))
            }
        };
        let managed = self.managed.unwrap_or(0);
        debug!(
            "Zone {} node {}: start_pfn={} spanned={} managed={}",
            self.name, self.node, start, spanned, managed
        );
        Ok((self.node, Region::new(start, start + spanned, managed > 0)))
    }
}

fn push_zone(zone: Option<ZoneFields>, nodes: &mut Vec<NodeRegions>) -> Result<(), SamplerError> {
    if let Some(zone) = zone {
        let (node, region) = zone.into_region()?;
        match nodes.last_mut() {
            Some(last) if last.node == node => last.regions.push(region),
            _ => nodes.push(NodeRegions {
                node,
                regions: vec![region],
            }),
        }
    }
    Ok(())
}

/// Parses `/proc/zoneinfo` content.
///
/// Zones appear in node order and, within a node, in zone order, which is
/// exactly the traversal order the scanner needs.
pub fn parse_zoneinfo(content: &str) -> Result<Vec<NodeRegions>, SamplerError> {
    let mut nodes: Vec<NodeRegions> = Vec::new();
    let mut current: Option<ZoneFields> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("Node ") {
            push_zone(current.take(), &mut nodes)?;
            let (node, zone) = rest.split_once(',').ok_or_else(|| {
                SamplerError::parse("zoneinfo", format!("malformed zone header '{}'", trimmed))
            })?;
            let node: u32 = node
                .trim()
                .parse()
                .map_err(|e| SamplerError::parse("zoneinfo node id", e))?;
            let name = zone.trim().trim_start_matches("zone").trim().to_string();
            current = Some(ZoneFields {
                node,
                name,
                ..ZoneFields::default()
            });
            continue;
        }

        let Some(zone) = current.as_mut() else {
            continue;
        };
        let mut parts = trimmed.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let slot = match key {
            "spanned" => &mut zone.spanned,
            "managed" => &mut zone.managed,
            "start_pfn:" => &mut zone.start_pfn,
            _ => continue,
        };
        *slot = Some(
            value
                .parse()
                .map_err(|e| SamplerError::parse(format!("zoneinfo {}", key), e))?,
        );
    }
    push_zone(current.take(), &mut nodes)?;

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(bits: &[u64]) -> u64 {
        bits.iter().fold(0, |acc, bit| acc | (1 << bit))
    }

    #[test]
    fn test_is_eligible_anon_thp() {
        let head = flags(&[KPF_ANON, KPF_THP, KPF_COMPOUND_HEAD]);
        let tail = flags(&[KPF_ANON, KPF_THP, KPF_COMPOUND_TAIL]);
        assert!(is_eligible(head, tail));
    }

    #[test]
    fn test_is_eligible_rejects_incomplete_heads() {
        let tail = flags(&[KPF_COMPOUND_TAIL]);
        // page cache THP
        assert!(!is_eligible(flags(&[KPF_THP, KPF_COMPOUND_HEAD]), tail));
        // anonymous compound page that is not a THP (hugetlbfs and friends)
        assert!(!is_eligible(flags(&[KPF_ANON, KPF_COMPOUND_HEAD]), tail));
        // tail frame of a THP, not its head
        assert!(!is_eligible(flags(&[KPF_ANON, KPF_THP, KPF_COMPOUND_TAIL]), tail));
        assert!(!is_eligible(0, tail));
    }

    #[test]
    fn test_is_eligible_requires_tail_in_same_compound() {
        let head = flags(&[KPF_ANON, KPF_THP, KPF_COMPOUND_HEAD]);
        // smaller aligned mTHP: the last frame is the head of the next folio
        assert!(!is_eligible(head, head));
        assert!(!is_eligible(head, flags(&[KPF_ANON])));
        assert!(!is_eligible(head, flags(&[KPF_NOPAGE])));
    }

    const ZONEINFO: &str = "\
Node 0, zone      DMA
  per-node stats
      nr_inactive_anon 4006
      nr_active_anon 215817
  pages free     3840
        boost    0
        min      32
        spanned  4095
        present  3998
        managed  3840
        cma      0
        protection: (0, 1933, 7882, 7882, 7882)
  pagesets
    cpu: 0
              count: 0
  node_unreclaimable:  0
  start_pfn:           1
Node 0, zone    DMA32
  pages free     262144
        spanned  1044480
        present  520160
        managed  503776
  start_pfn:           4096
Node 0, zone   Normal
  pages free     0
        spanned  0
        present  0
        managed  0
  start_pfn:           0
Node 1, zone   Normal
  pages free     100
        spanned  2097152
        present  2097152
        managed  2050000
  start_pfn:           1048576
";

    #[test]
    fn test_parse_zoneinfo_groups_zones_by_node() {
        let nodes = parse_zoneinfo(ZONEINFO).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node, 0);
        assert_eq!(nodes[0].regions.len(), 3);
        assert_eq!(nodes[1].node, 1);

        assert_eq!(nodes[0].regions[0], Region::new(1, 4096, true));
        assert_eq!(nodes[0].regions[1], Region::new(4096, 1048576, true));
        // Empty zone: present in order, but never manageable.
        assert_eq!(nodes[0].regions[2], Region::new(0, 0, false));
        assert_eq!(nodes[1].regions[0], Region::new(1048576, 3145728, true));
    }

    #[test]
    fn test_parse_zoneinfo_missing_start_pfn() {
        let content = "Node 0, zone DMA\n        spanned  10\n        managed  10\n";
        assert!(parse_zoneinfo(content).is_err());
    }

    #[test]
    fn test_parse_zoneinfo_unpopulated_zone() {
        let content = "\
Node 0, zone   Normal
  pages free     0
        spanned  0
        present  0
        managed  0
Node 0, zone  Movable
  pages free     0
        spanned  0
        present  0
        managed  0
";
        let nodes = parse_zoneinfo(content).unwrap();
        assert_eq!(nodes[0].regions, vec![Region::new(0, 0, false); 2]);
    }

    #[test]
    fn test_parse_zoneinfo_empty() {
        assert!(parse_zoneinfo("").unwrap().is_empty());
    }

    #[test]
    fn test_flag_bits() {
        let flags = (1 << KPF_ANON) | (1 << KPF_THP) | (1 << KPF_COMPOUND_HEAD);
        assert!(has_flag(flags, KPF_ANON));
        assert!(has_flag(flags, KPF_THP));
        assert!(!has_flag(flags, KPF_NOPAGE));
        assert!(!has_flag(flags, KPF_COMPOUND_TAIL));
    }

    #[test]
    fn test_page_size_positive() {
        assert!(*PAGE_SIZE > 0);
    }
}
