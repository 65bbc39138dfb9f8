//! Simulation health counters and logging setup.
//!
//! One `Metrics` instance lives for the life of the process, shared by
//! the tick loop and the HTTP layer. Rejections and cognition cues are
//! tallied by their domain type rather than by free-form strings, so a
//! typo cannot silently split a counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use microcosm_data::ReasonCode;
use tracing_subscriber::EnvFilter;

use crate::narrative::CognitionCue;

/// Ticks between periodic health log lines.
const LOG_EVERY: u64 = 500;

/// A tick slower than this counts against the slow-tick tally.
const SLOW_TICK: Duration = Duration::from_millis(100);

pub struct Metrics {
    ticks: AtomicU64,
    tick_nanos: AtomicU64,
    slow_ticks: AtomicU64,
    living_actors: AtomicU64,
    blocks: AtomicU64,
    encounters: AtomicU64,
    interventions: AtomicU64,
    rejections: Mutex<HashMap<ReasonCode, u64>>,
    cues: Mutex<HashMap<CognitionCue, u64>>,
    started: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_nanos: AtomicU64::new(0),
            slow_ticks: AtomicU64::new(0),
            living_actors: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            encounters: AtomicU64::new(0),
            interventions: AtomicU64::new(0),
            rejections: Mutex::new(HashMap::new()),
            cues: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    /// Folds one finished tick into the running totals and emits the
    /// periodic health line.
    pub fn record_tick(&self, duration: Duration, actors: usize, blocks: usize) {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.tick_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if duration >= SLOW_TICK {
            self.slow_ticks.fetch_add(1, Ordering::Relaxed);
        }
        self.living_actors.store(actors as u64, Ordering::Relaxed);
        self.blocks.store(blocks as u64, Ordering::Relaxed);

        if ticks % LOG_EVERY == 0 {
            tracing::info!(
                ticks,
                actors,
                blocks,
                mean_tick_us = self.mean_tick().as_micros() as u64,
                slow_ticks = self.slow_ticks.load(Ordering::Relaxed),
                encounters = self.encounters.load(Ordering::Relaxed),
                interventions = self.interventions.load(Ordering::Relaxed),
                "simulation health"
            );
        }
    }

    pub fn record_encounters(&self, count: usize) {
        self.encounters.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_interventions(&self, count: usize) {
        self.interventions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Tallies one rejected proposal under its reason code.
    pub fn record_rejection(&self, code: ReasonCode) {
        let mut rejections = self.rejections.lock().unwrap_or_else(|e| e.into_inner());
        *rejections.entry(code).or_insert(0) += 1;
    }

    /// Tallies one cognition call under the cue that triggered it.
    pub fn record_cue(&self, cue: CognitionCue) {
        let mut cues = self.cues.lock().unwrap_or_else(|e| e.into_inner());
        *cues.entry(cue).or_insert(0) += 1;
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejections(&self, code: ReasonCode) -> u64 {
        let rejections = self.rejections.lock().unwrap_or_else(|e| e.into_inner());
        rejections.get(&code).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn cue_count(&self, cue: CognitionCue) -> u64 {
        let cues = self.cues.lock().unwrap_or_else(|e| e.into_inner());
        cues.get(&cue).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn encounters(&self) -> u64 {
        self.encounters.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn interventions(&self) -> u64 {
        self.interventions.load(Ordering::Relaxed)
    }

    /// Mean tick duration over the whole run.
    #[must_use]
    pub fn mean_tick(&self) -> Duration {
        let ticks = self.ticks.load(Ordering::Relaxed);
        if ticks == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.tick_nanos.load(Ordering::Relaxed) / ticks)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Initializes the tracing subscriber, honoring `RUST_LOG`.
pub fn init_logging() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_tick_over_run() {
        let metrics = Metrics::new();
        assert_eq!(metrics.mean_tick(), Duration::ZERO);
        metrics.record_tick(Duration::from_millis(10), 8, 100);
        metrics.record_tick(Duration::from_millis(20), 8, 100);
        assert_eq!(metrics.ticks(), 2);
        assert_eq!(metrics.mean_tick(), Duration::from_millis(15));
    }

    #[test]
    fn test_rejections_keyed_by_reason() {
        let metrics = Metrics::new();
        metrics.record_rejection(ReasonCode::PositionOccupied);
        metrics.record_rejection(ReasonCode::PositionOccupied);
        metrics.record_rejection(ReasonCode::MoveTooFar);
        assert_eq!(metrics.rejections(ReasonCode::PositionOccupied), 2);
        assert_eq!(metrics.rejections(ReasonCode::MoveTooFar), 1);
        assert_eq!(metrics.rejections(ReasonCode::OutOfBounds), 0);
    }

    #[test]
    fn test_cues_and_sweep_totals() {
        let metrics = Metrics::new();
        metrics.record_cue(CognitionCue::Conversation);
        metrics.record_encounters(3);
        metrics.record_interventions(1);
        assert_eq!(metrics.cue_count(CognitionCue::Conversation), 1);
        assert_eq!(metrics.cue_count(CognitionCue::ImminentDeath), 0);
        assert_eq!(metrics.encounters(), 3);
        assert_eq!(metrics.interventions(), 1);
    }
}
