//! Prometheus metrics definitions for herakles-thp-exporter.
//!
//! The utilization histogram is exported per bucket, labelled with the same
//! `<start>-<end>` range the text report uses. Sampler telemetry is kept
//! separate so it can be switched off with `--disable-telemetry`.

use herakles_thp_exporter::{bucket_range, ScanGeometry, ScanStats, Snapshot};
use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use std::sync::atomic::Ordering;

/// Collection of Prometheus metrics for the THP utilization histogram.
#[derive(Clone)]
pub struct ThpMetrics {
    // ========== Histogram Metrics ==========
    pub blocks: GaugeVec,     // labels: bucket
    pub zero_pages: GaugeVec, // labels: bucket
    pub last_scan_time_seconds: Gauge,
    pub last_scan_duration_seconds: Gauge,
    pub sweeps_total: Counter,
    pub block_pages: Gauge,
}

impl ThpMetrics {
    /// Creates and registers all histogram metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let blocks = GaugeVec::new(
            Opts::new(
                "herakles_thp_blocks",
                "Huge pages whose utilization fell in the bucket during the last sweep",
            ),
            &["bucket"],
        )?;
        let zero_pages = GaugeVec::new(
            Opts::new(
                "herakles_thp_zero_pages",
                "Zero-filled base pages inside the huge pages of the bucket",
            ),
            &["bucket"],
        )?;
        let last_scan_time_seconds = Gauge::new(
            "herakles_thp_last_scan_time_seconds",
            "Time the last complete sweep finished, in seconds since the epoch",
        )?;
        let last_scan_duration_seconds = Gauge::new(
            "herakles_thp_last_scan_duration_seconds",
            "Duration of the last complete sweep in seconds",
        )?;
        let sweeps_total = Counter::new(
            "herakles_thp_sweeps_total",
            "Complete sweeps of physical memory since start",
        )?;
        let block_pages = Gauge::new(
            "herakles_thp_block_pages",
            "Base pages per huge page used for bucketing",
        )?;

        registry.register(Box::new(blocks.clone()))?;
        registry.register(Box::new(zero_pages.clone()))?;
        registry.register(Box::new(last_scan_time_seconds.clone()))?;
        registry.register(Box::new(last_scan_duration_seconds.clone()))?;
        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(block_pages.clone()))?;

        Ok(Self {
            blocks,
            zero_pages,
            last_scan_time_seconds,
            last_scan_duration_seconds,
            sweeps_total,
            block_pages,
        })
    }

    /// Copies a published snapshot into the gauges.
    pub fn update_from_snapshot(&self, snapshot: &Snapshot, geometry: &ScanGeometry) {
        for (i, bucket) in snapshot.buckets.iter().enumerate() {
            let (start, end) = bucket_range(geometry, i);
            let label = format!("{}-{}", start, end);
            self.blocks
                .with_label_values(&[&label])
                .set(bucket.blocks as f64);
            self.zero_pages
                .with_label_values(&[&label])
                .set(bucket.zero_pages as f64);
        }

        self.last_scan_time_seconds
            .set(snapshot.last_scan_time.as_secs_f64());
        self.last_scan_duration_seconds
            .set(snapshot.last_scan_duration.as_secs_f64());
        self.block_pages.set(geometry.block_pages as f64);

        // Counters only go up; use reset + inc_by to mirror the absolute value
        self.sweeps_total.reset();
        self.sweeps_total.inc_by(snapshot.sweeps as f64);
    }
}

/// Internal sampler metrics, registered only when telemetry is enabled.
#[derive(Clone)]
pub struct TelemetryMetrics {
    pub ticks_total: Counter,
    pub candidates_total: Counter,
    pub classified_total: Counter,
    pub skipped_total: GaugeVec, // labels: reason
    pub tick_duration_ms: Gauge,
    pub scrape_duration_seconds: Gauge,
}

impl TelemetryMetrics {
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let ticks_total = Counter::new(
            "herakles_thp_sampler_ticks_total",
            "Scan ticks executed by the sampler",
        )?;
        let candidates_total = Counter::new(
            "herakles_thp_sampler_candidates_total",
            "Huge page positions visited",
        )?;
        let classified_total = Counter::new(
            "herakles_thp_sampler_classified_total",
            "Huge pages classified into a bucket",
        )?;
        let skipped_total = GaugeVec::new(
            Opts::new(
                "herakles_thp_sampler_skipped_total",
                "Huge page positions skipped, by reason",
            ),
            &["reason"],
        )?;
        let tick_duration_ms = Gauge::new(
            "herakles_thp_sampler_tick_duration_ms",
            "Average scan tick duration in milliseconds",
        )?;
        let scrape_duration_seconds = Gauge::new(
            "herakles_thp_scrape_duration_seconds",
            "Time spent serving the last /metrics request",
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(candidates_total.clone()))?;
        registry.register(Box::new(classified_total.clone()))?;
        registry.register(Box::new(skipped_total.clone()))?;
        registry.register(Box::new(tick_duration_ms.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            ticks_total,
            candidates_total,
            classified_total,
            skipped_total,
            tick_duration_ms,
            scrape_duration_seconds,
        })
    }

    pub fn update_from_stats(&self, stats: &ScanStats) {
        set_counter(&self.ticks_total, stats.ticks.load(Ordering::Relaxed));
        set_counter(
            &self.candidates_total,
            stats.candidates.load(Ordering::Relaxed),
        );
        set_counter(
            &self.classified_total,
            stats.classified.load(Ordering::Relaxed),
        );

        for (reason, counter) in [
            ("absent", &stats.absent),
            ("ineligible", &stats.ineligible),
            ("not_applicable", &stats.not_applicable),
        ] {
            self.skipped_total
                .with_label_values(&[reason])
                .set(counter.load(Ordering::Relaxed) as f64);
        }

        let (_, avg, _, _, _) = stats.tick_duration_ms.snapshot();
        self.tick_duration_ms.set(avg);
    }
}

fn set_counter(counter: &Counter, value: u64) {
    counter.reset();
    counter.inc_by(value as f64);
}
