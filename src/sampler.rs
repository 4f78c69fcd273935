//! Background sampler task.
//!
//! A [`Sampler`] owns a [`ScanEngine`] and drives it from a single tokio
//! task. The interval is re-armed after each tick completes, so a slow
//! tick is always followed by a full interval of rest. Ticks touch physical
//! memory with blocking reads, so each one runs on the blocking pool; the
//! engine is moved in and handed back, which keeps exactly one tick in
//! flight at any time.
//!
//! The returned [`SamplerHandle`] is the only way to talk to the task:
//! read the published snapshot, pause and resume, or stop it. Control
//! changes are honored at tick boundaries.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::health_stats::ScanStats;
use crate::scan::ScanEngine;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Requested run state of the sampler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Run,
    Pause,
    Stop,
}

pub struct Sampler {
    engine: ScanEngine,
    interval: Duration,
    stats: Arc<ScanStats>,
}

impl Sampler {
    pub fn new(engine: ScanEngine, interval: Duration, stats: Arc<ScanStats>) -> Self {
        Self {
            engine,
            interval,
            stats,
        }
    }

    /// Spawns the sampler task on the current tokio runtime. The first tick
    /// fires one interval after start.
    pub fn start(self) -> SamplerHandle {
        let (control, receiver) = watch::channel(Control::Run);
        let store = self.engine.store();
        let stats = self.stats.clone();

        info!(
            "Starting sampler: {} memory, tick every {} ms, {} candidates per tick",
            self.engine.memory_name(),
            self.interval.as_millis(),
            self.engine.geometry().scan_chunk
        );

        let task = tokio::spawn(run(self.engine, self.interval, self.stats, receiver));

        SamplerHandle {
            control,
            task,
            store,
            stats,
        }
    }
}

enum Event {
    Tick,
    ControlChanged,
    Closed,
}

async fn run(
    mut engine: ScanEngine,
    interval: Duration,
    stats: Arc<ScanStats>,
    mut control: watch::Receiver<Control>,
) -> Option<ScanEngine> {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() completes its first tick immediately
    ticker.tick().await;

    loop {
        let requested = *control.borrow_and_update();
        let event = match requested {
            Control::Stop => break,
            Control::Pause => match control.changed().await {
                Ok(()) => Event::ControlChanged,
                Err(_) => Event::Closed,
            },
            Control::Run => {
                tokio::select! {
                    _ = ticker.tick() => Event::Tick,
                    changed = control.changed() => match changed {
                        Ok(()) => Event::ControlChanged,
                        Err(_) => Event::Closed,
                    },
                }
            }
        };

        match event {
            Event::Tick => {}
            Event::ControlChanged => {
                debug!("Sampler control changed to {:?}", *control.borrow());
                continue;
            }
            Event::Closed => {
                debug!("Sampler handle dropped, stopping");
                break;
            }
        }

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let outcome = engine.tick();
            (engine, outcome)
        })
        .await;

        match result {
            Ok((returned, outcome)) => {
                engine = returned;
                stats.record_tick(&outcome, started.elapsed());
                // Next tick is one full interval after this one finished
                ticker.reset();
            }
            Err(e) => {
                error!("Scan tick failed, sampler stopped: {}", e);
                return None;
            }
        }
    }

    info!("Sampler stopped after {} sweeps", engine.sweeps());
    Some(engine)
}

/// Handle to a running [`Sampler`].
pub struct SamplerHandle {
    control: watch::Sender<Control>,
    task: JoinHandle<Option<ScanEngine>>,
    store: Arc<SnapshotStore>,
    stats: Arc<ScanStats>,
}

impl SamplerHandle {
    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    pub fn stats(&self) -> Arc<ScanStats> {
        self.stats.clone()
    }

    /// Suspends ticking. The cursor and live accumulator are kept.
    pub fn pause(&self) {
        info!("Pausing sampler");
        self.control.send_replace(Control::Pause);
    }

    pub fn resume(&self) {
        info!("Resuming sampler");
        self.control.send_replace(Control::Run);
    }

    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == Control::Pause
    }

    /// Stops the task at the next tick boundary and returns the engine,
    /// or `None` if the task died.
    pub async fn stop(self) -> Option<ScanEngine> {
        self.control.send_replace(Control::Stop);
        match self.task.await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Sampler task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::memory::{SyntheticLayout, SyntheticMemory};
    use crate::scan::ScanGeometry;
    use std::sync::atomic::Ordering;

    fn sampler(interval_ms: u64) -> Sampler {
        let mut layout = SyntheticLayout::new(64, 8);
        layout.region(0, 0, 16, true).block(0, 2).block(8, 8);
        let memory = Arc::new(SyntheticMemory::from_layout(&layout).unwrap());
        let geometry = ScanGeometry::new(8, 4, 256);
        let store = Arc::new(SnapshotStore::new(geometry.bucket_count));
        let engine = ScanEngine::new(memory, Arc::new(SystemClock), geometry, store).unwrap();
        Sampler::new(
            engine,
            Duration::from_millis(interval_ms),
            Arc::new(ScanStats::new()),
        )
    }

    async fn wait_for_sweeps(handle: &SamplerHandle, sweeps: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.snapshot().sweeps < sweeps {
            assert!(Instant::now() < deadline, "sampler made no progress");
            time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_sampler_publishes_and_stops() {
        let handle = sampler(2).start();
        assert_eq!(handle.snapshot().sweeps, 0);

        wait_for_sweeps(&handle, 2).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.total_blocks(), 2);

        let stats = handle.stats();
        let engine = handle.stop().await.expect("engine returned");
        assert!(engine.sweeps() >= 2);
        assert!(stats.ticks.load(Ordering::Relaxed) >= 4);
    }

    #[tokio::test]
    async fn test_paused_sampler_does_not_tick() {
        let handle = sampler(2).start();
        wait_for_sweeps(&handle, 1).await;

        handle.pause();
        assert!(handle.is_paused());
        // let any in-flight tick land
        time::sleep(Duration::from_millis(20)).await;
        let ticks = handle.stats().ticks.load(Ordering::Relaxed);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(handle.stats().ticks.load(Ordering::Relaxed), ticks);

        handle.resume();
        assert!(!handle.is_paused());
        let before = handle.snapshot().sweeps;
        wait_for_sweeps(&handle, before + 1).await;

        assert!(handle.stop().await.is_some());
    }

    #[tokio::test]
    async fn test_stop_while_paused() {
        let handle = sampler(1_000).start();
        handle.pause();
        let engine = handle.stop().await.expect("engine returned");
        assert_eq!(engine.sweeps(), 0);
    }
}
