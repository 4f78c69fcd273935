//! Health statistics for the sampler.
//!
//! This module tracks what the scan task has been doing (ticks, sweeps and
//! how candidates were disposed of) plus tick timing and HTTP request rate,
//! and renders it as the plain-text table served at `/health`.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use crate::scan::TickOutcome;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Sliding window of HTTP request timestamps (last 10 minutes).
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(256)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            let cutoff = now.checked_sub(Duration::from_secs(600)).unwrap_or(now);
            while guard.front().is_some_and(|&t| t < cutoff) {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            let cutoff = now.checked_sub(Duration::from_secs(60)).unwrap_or(now);
            guard.iter().filter(|&&t| t >= cutoff).count() as u64
        } else {
            0
        }
    }
}

/// Counters and timings for the scan task.
pub struct ScanStats {
    pub ticks: AtomicU64,
    pub advances: AtomicU64,
    pub sweeps: AtomicU64,

    // Candidate disposition, summed over all chunks
    pub candidates: AtomicU64,
    pub classified: AtomicU64,
    pub absent: AtomicU64,
    pub ineligible: AtomicU64,
    pub not_applicable: AtomicU64,

    pub tick_duration_ms: Stat,
    pub http_request_timestamps: RequestTimestamps,

    pub start_time: Instant,
    pub last_sweep_at: StdRwLock<Option<Instant>>,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            advances: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            candidates: AtomicU64::new(0),
            classified: AtomicU64::new(0),
            absent: AtomicU64::new(0),
            ineligible: AtomicU64::new(0),
            not_applicable: AtomicU64::new(0),
            tick_duration_ms: Stat::default(),
            http_request_timestamps: RequestTimestamps::default(),
            start_time: Instant::now(),
            last_sweep_at: StdRwLock::new(None),
        }
    }
}

impl ScanStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_tick(&self, outcome: &TickOutcome, elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_duration_ms
            .add_sample(elapsed.as_secs_f64() * 1000.0);

        match outcome {
            TickOutcome::Advanced { .. } => {
                self.advances.fetch_add(1, Ordering::Relaxed);
            }
            TickOutcome::Published { .. } => {
                self.advances.fetch_add(1, Ordering::Relaxed);
                self.sweeps.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut guard) = self.last_sweep_at.write() {
                    *guard = Some(Instant::now());
                }
            }
            TickOutcome::Scanned(chunk) => {
                self.candidates
                    .fetch_add(chunk.candidates, Ordering::Relaxed);
                self.classified
                    .fetch_add(chunk.classified, Ordering::Relaxed);
                self.absent.fetch_add(chunk.absent, Ordering::Relaxed);
                self.ineligible
                    .fetch_add(chunk.ineligible, Ordering::Relaxed);
                self.not_applicable
                    .fetch_add(chunk.not_applicable, Ordering::Relaxed);
            }
        }
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_sweep_age_str(&self) -> String {
        match self.last_sweep_at.read() {
            Ok(guard) => match *guard {
                Some(at) => format!("{:.1}s ago", at.elapsed().as_secs_f64()),
                None => "N/A".to_string(),
            },
            Err(_) => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;
        let (td_cur, td_avg, td_max, td_min, _) = self.tick_duration_ms.snapshot();

        let mut out = String::new();
        writeln!(out, "HEALTH ENDPOINT - SAMPLER INTERNAL STATS").ok();
        writeln!(out, "=========================================").ok();
        writeln!(out).ok();

        writeln!(out, "TICK TIMING").ok();
        writeln!(out, "-----------").ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "tick_duration (ms)",
            format!("{:.3}", td_cur),
            format!("{:.3}", td_avg),
            format!("{:.3}", td_max),
            format!("{:.3}", td_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "SCAN PROGRESS").ok();
        writeln!(out, "-------------").ok();
        let counters = [
            ("ticks", &self.ticks),
            ("region_advances", &self.advances),
            ("sweeps_completed", &self.sweeps),
            ("candidates_visited", &self.candidates),
            ("blocks_classified", &self.classified),
            ("skipped_absent", &self.absent),
            ("skipped_ineligible", &self.ineligible),
            ("skipped_not_applicable", &self.not_applicable),
        ];
        for (name, counter) in counters {
            writeln!(
                out,
                "{:left$} | {:>col$}",
                name,
                counter.load(Ordering::Relaxed),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:>col$}",
            "last_sweep",
            self.get_last_sweep_age_str(),
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {:>col$}",
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute(),
            left = left_col,
            col = col_w
        )
        .ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ChunkOutcome;

    #[test]
    fn test_running_stat() {
        let mut stat = RunningStat::default();
        assert_eq!(stat.avg(), 0.0);
        stat.add(2.0);
        stat.add(4.0);
        stat.add(0.0);
        assert_eq!(stat.count, 3);
        assert_eq!(stat.min, 0.0);
        assert_eq!(stat.max, 4.0);
        assert_eq!(stat.last, 0.0);
        assert!((stat.avg() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_tick_outcomes() {
        let stats = ScanStats::new();
        let chunk = ChunkOutcome {
            candidates: 10,
            absent: 4,
            ineligible: 3,
            not_applicable: 1,
            classified: 2,
        };

        stats.record_tick(&TickOutcome::Scanned(chunk), Duration::from_millis(3));
        stats.record_tick(&TickOutcome::Advanced { region: 1 }, Duration::from_millis(1));
        stats.record_tick(&TickOutcome::Published { sweep: 1 }, Duration::from_millis(1));

        assert_eq!(stats.ticks.load(Ordering::Relaxed), 3);
        assert_eq!(stats.advances.load(Ordering::Relaxed), 2);
        assert_eq!(stats.sweeps(), 1);
        assert_eq!(stats.candidates.load(Ordering::Relaxed), 10);
        assert_eq!(stats.classified.load(Ordering::Relaxed), 2);
        assert_eq!(stats.absent.load(Ordering::Relaxed), 4);

        let (_, _, max, min, count) = stats.tick_duration_ms.snapshot();
        assert_eq!(count, 3);
        assert!((max - 3.0).abs() < 1e-9);
        assert!((min - 1.0).abs() < 1e-9);
        assert_ne!(stats.get_last_sweep_age_str(), "N/A");
    }

    #[test]
    fn test_render_table_lists_counters() {
        let stats = ScanStats::new();
        stats.record_http_request();
        let table = stats.render_table();
        assert!(table.contains("SAMPLER INTERNAL STATS"));
        assert!(table.contains("blocks_classified"));
        assert!(table.contains("skipped_not_applicable"));
        assert!(table.contains("N/A"));
    }

    #[test]
    fn test_request_timestamps_count() {
        let timestamps = RequestTimestamps::default();
        timestamps.record();
        timestamps.record();
        assert_eq!(timestamps.count_last_minute(), 2);
    }
}
