//! Integration tests for the scan engine.
//!
//! These tests drive complete sweeps over synthetic memory and check the
//! published histogram, the cursor behavior across regions and chunks, and
//! the plain-text report.

use herakles_thp_exporter::{
    bucket_for, render_report, Bucket, Cursor, ManualClock, ScanEngine, ScanGeometry,
    SnapshotStore, SyntheticLayout, SyntheticMemory, TickOutcome,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: ScanEngine,
    memory: Arc<SyntheticMemory>,
    clock: Arc<ManualClock>,
    store: Arc<SnapshotStore>,
}

fn harness(layout: &SyntheticLayout, geometry: ScanGeometry) -> Harness {
    let memory = Arc::new(SyntheticMemory::from_layout(layout).expect("valid layout"));
    let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000)));
    let store = Arc::new(SnapshotStore::new(geometry.bucket_count));
    let engine = ScanEngine::new(memory.clone(), clock.clone(), geometry, store.clone())
        .expect("engine builds");
    Harness {
        engine,
        memory,
        clock,
        store,
    }
}

fn small_geometry() -> ScanGeometry {
    ScanGeometry::new(8, 4, 256)
}

#[test]
fn test_three_block_scenario() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 24, true).block(0, 2).block(8, 6).block(16, 8);
    let mut h = harness(&layout, small_geometry());

    h.engine.run_sweep();
    let snapshot = h.store.current();

    assert_eq!(snapshot.sweeps, 1);
    assert_eq!(snapshot.buckets[0], Bucket::default());
    assert_eq!(snapshot.buckets[1], Bucket { blocks: 1, zero_pages: 6 });
    assert_eq!(snapshot.buckets[2], Bucket::default());
    assert_eq!(snapshot.buckets[3], Bucket { blocks: 2, zero_pages: 2 });
}

#[test]
fn test_report_for_three_block_scenario() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 24, true).block(0, 2).block(8, 6).block(16, 8);
    let mut h = harness(&layout, small_geometry());

    h.clock.advance(Duration::from_millis(4_567));
    h.engine.run_sweep();

    let report = render_report(&h.store.current(), &small_geometry());
    assert_eq!(
        report,
        "Utilized[0-1]: 0 0\n\
         Utilized[2-3]: 1 6\n\
         Utilized[4-5]: 0 0\n\
         Utilized[6-8]: 2 2\n\
         Last Scan Time: 1004.56s\n\
         Last Scan Duration: 4.56s\n"
    );
}

#[test]
fn test_unmanageable_region_is_never_read() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout
        .region(0, 0, 16, true)
        .block(0, 4)
        .region(0, 16, 48, false)
        .block(16, 8)
        .block(24, 1)
        .region(1, 64, 72, true)
        .block(64, 8);
    let mut h = harness(&layout, small_geometry());

    assert!(matches!(h.engine.tick(), TickOutcome::Scanned(_)));
    // Leaving region 0 lands on the unmanageable region...
    assert_eq!(h.engine.tick(), TickOutcome::Advanced { region: 1 });
    // ...which is stepped over without a scan.
    assert_eq!(h.engine.tick(), TickOutcome::Advanced { region: 2 });
    assert_eq!(h.engine.cursor(), Cursor { region: 2, pfn: 64 });

    h.engine.run_sweep();
    assert_eq!(h.memory.blocks_read(), vec![0, 64]);
    assert_eq!(h.store.current().total_blocks(), 2);
}

#[test]
fn test_chunk_resumes_mid_region() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 40, true);
    for (i, utilized) in [8, 7, 6, 5, 4].into_iter().enumerate() {
        layout.block(i as u64 * 8, utilized);
    }
    let mut h = harness(&layout, ScanGeometry::new(8, 4, 2));

    match h.engine.tick() {
        TickOutcome::Scanned(chunk) => assert_eq!(chunk.candidates, 2),
        other => panic!("expected a scan, got {:?}", other),
    }
    assert_eq!(h.engine.cursor(), Cursor { region: 0, pfn: 16 });
    assert_eq!(h.engine.live().total_blocks(), 2);

    h.engine.tick();
    assert_eq!(h.engine.cursor(), Cursor { region: 0, pfn: 32 });

    match h.engine.tick() {
        TickOutcome::Scanned(chunk) => assert_eq!(chunk.candidates, 1),
        other => panic!("expected a scan, got {:?}", other),
    }
    assert_eq!(h.engine.live().total_blocks(), 5);
    assert_eq!(h.engine.tick(), TickOutcome::Published { sweep: 1 });
    assert_eq!(h.store.current().total_blocks(), 5);
}

#[test]
fn test_no_tick_exceeds_chunk_size() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 8 * 50, true);
    for i in 0..50 {
        layout.block(i * 8, i % 9);
    }
    let mut h = harness(&layout, ScanGeometry::new(8, 4, 7));

    loop {
        match h.engine.tick() {
            TickOutcome::Scanned(chunk) => assert!(chunk.candidates <= 7),
            TickOutcome::Published { .. } => break,
            TickOutcome::Advanced { .. } => {}
        }
    }
    assert_eq!(h.store.current().total_blocks(), 50);
}

#[test]
fn test_sum_invariants_after_sweep() {
    let geometry = small_geometry();
    let utilizations: [u64; 9] = [0, 1, 2, 3, 4, 5, 6, 7, 8];

    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 8 * 12, true);
    for (i, u) in utilizations.iter().enumerate() {
        layout.block(i as u64 * 8, *u);
    }
    // Skipped kinds must not be counted
    layout.ineligible(72).unreadable(80);

    let mut h = harness(&layout, geometry);
    h.engine.run_sweep();
    let snapshot = h.store.current();

    assert_eq!(snapshot.total_blocks(), utilizations.len() as u64);

    let mut expected = vec![Bucket::default(); geometry.bucket_count];
    for u in utilizations {
        let bucket = bucket_for(&geometry, u as i64).expect("in range");
        expected[bucket].blocks += 1;
        expected[bucket].zero_pages += geometry.block_pages - u;
    }
    assert_eq!(snapshot.buckets, expected);
}

#[test]
fn test_sweeps_are_idempotent() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout
        .region(0, 0, 32, true)
        .block(0, 3)
        .block_with_zero_pages(8, vec![0, 2, 4])
        .region(1, 128, 160, true)
        .block(136, 8)
        .ineligible(144);
    let mut h = harness(&layout, ScanGeometry::new(8, 4, 3));

    h.clock.advance(Duration::from_secs(2));
    h.engine.run_sweep();
    let first = h.store.current();

    h.clock.advance(Duration::from_secs(7));
    h.engine.run_sweep();
    let second = h.store.current();

    assert_eq!(first.buckets, second.buckets);
    assert_eq!(second.sweeps, 2);
    assert_eq!(first.last_scan_duration, Duration::from_secs(2));
    assert_eq!(second.last_scan_duration, Duration::from_secs(7));
}

#[test]
fn test_publish_resets_live_accumulator() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout.region(0, 0, 16, true).block(0, 5).block(8, 1);
    let mut h = harness(&layout, small_geometry());

    h.engine.tick();
    assert_eq!(h.engine.live().total_blocks(), 2);
    assert_eq!(h.store.current().sweeps, 0);
    assert_eq!(h.store.current().total_blocks(), 0);

    assert_eq!(h.engine.tick(), TickOutcome::Published { sweep: 1 });
    assert!(h.engine.live().is_zero());
    assert_eq!(h.store.current().buckets, {
        let mut b = vec![Bucket::default(); 4];
        b[0] = Bucket { blocks: 1, zero_pages: 7 };
        b[2] = Bucket { blocks: 1, zero_pages: 3 };
        b
    });
}

#[test]
fn test_unaligned_region_start_is_aligned_up() {
    let mut layout = SyntheticLayout::new(64, 8);
    layout
        .region(0, 0, 8, false)
        .region(0, 3, 24, true)
        .block(8, 8)
        .block(16, 2);
    let mut h = harness(&layout, small_geometry());

    assert_eq!(h.engine.tick(), TickOutcome::Advanced { region: 1 });
    assert_eq!(h.engine.cursor(), Cursor { region: 1, pfn: 8 });
    h.engine.run_sweep();
    assert_eq!(h.store.current().total_blocks(), 2);
}

#[test]
fn test_no_memory_nodes_is_a_startup_error() {
    let layout = SyntheticLayout::new(64, 8);
    let memory = Arc::new(SyntheticMemory::from_layout(&layout).unwrap());
    let result = ScanEngine::new(
        memory,
        Arc::new(ManualClock::default()),
        small_geometry(),
        Arc::new(SnapshotStore::new(4)),
    );
    assert!(result.is_err());
}
