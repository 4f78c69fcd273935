//! Integration tests for the scan statistics module.
//!
//! These tests verify that ScanStats tracks tick outcomes, sweep counts
//! and tick timing, and that the health table reports them.

use herakles_thp_exporter::health_stats::ScanStats;
use herakles_thp_exporter::{ChunkOutcome, TickOutcome};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_scan_stats_initialize_empty() {
    let stats = ScanStats::new();

    assert_eq!(stats.ticks.load(Ordering::Relaxed), 0);
    assert_eq!(stats.sweeps(), 0);
    assert_eq!(stats.candidates.load(Ordering::Relaxed), 0);

    let (cur, avg, _, _, count) = stats.tick_duration_ms.snapshot();
    assert_eq!(count, 0);
    assert_eq!(cur, 0.0);
    assert_eq!(avg, 0.0);

    assert_eq!(stats.get_last_sweep_age_str(), "N/A");
}

#[test]
fn test_scan_stats_skip_reasons() {
    let stats = ScanStats::new();
    let chunk = ChunkOutcome {
        candidates: 10,
        absent: 4,
        ineligible: 3,
        not_applicable: 1,
        classified: 2,
    };

    stats.record_tick(&TickOutcome::Scanned(chunk), Duration::from_millis(3));
    stats.record_tick(&TickOutcome::Scanned(chunk), Duration::from_millis(5));

    assert_eq!(stats.candidates.load(Ordering::Relaxed), 20);
    assert_eq!(stats.absent.load(Ordering::Relaxed), 8);
    assert_eq!(stats.ineligible.load(Ordering::Relaxed), 6);
    assert_eq!(stats.not_applicable.load(Ordering::Relaxed), 2);
    assert_eq!(stats.classified.load(Ordering::Relaxed), 4);

    let (cur, avg, max, min, count) = stats.tick_duration_ms.snapshot();
    assert_eq!(count, 2);
    assert!((cur - 5.0).abs() < 1e-9);
    assert!((avg - 4.0).abs() < 1e-9);
    assert!((max - 5.0).abs() < 1e-9);
    assert!((min - 3.0).abs() < 1e-9);
}

#[test]
fn test_scan_stats_sweeps_and_advances() {
    let stats = ScanStats::new();

    stats.record_tick(&TickOutcome::Advanced { region: 1 }, Duration::ZERO);
    stats.record_tick(&TickOutcome::Published { sweep: 1 }, Duration::ZERO);

    assert_eq!(stats.ticks.load(Ordering::Relaxed), 2);
    assert_eq!(stats.advances.load(Ordering::Relaxed), 2);
    assert_eq!(stats.sweeps(), 1);
    assert!(stats.get_last_sweep_age_str().ends_with("s ago"));
}

#[test]
fn test_scan_stats_concurrent_ticks() {
    let stats = Arc::new(ScanStats::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let stats = stats.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    stats.record_tick(&TickOutcome::Advanced { region: 0 }, Duration::ZERO);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.ticks.load(Ordering::Relaxed), 1000);
    let (_, _, _, _, count) = stats.tick_duration_ms.snapshot();
    assert_eq!(count, 1000);
}

#[test]
fn test_render_table_sections() {
    let stats = ScanStats::new();
    stats.record_tick(
        &TickOutcome::Scanned(ChunkOutcome {
            candidates: 3,
            classified: 3,
            ..Default::default()
        }),
        Duration::from_millis(1),
    );
    stats.record_http_request();

    let table = stats.render_table();
    assert!(table.contains("TICK TIMING"));
    assert!(table.contains("SCAN PROGRESS"));
    assert!(table.contains("tick_duration (ms)"));
}
