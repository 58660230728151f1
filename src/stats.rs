//! Performance statistics collection for `--stats` output.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::dispatch::Counters;
use crate::results::Results;

/// Snapshot of an engine's callback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCounts {
    /// Output/status lines received.
    pub lines: u64,
    /// External source evaluations requested by the engine.
    pub source_requests: u64,
    /// Requests for names that were never registered (first miss only).
    pub source_misses: u64,
    /// Data points streamed through `SendData` to a hook.
    pub samples: u64,
    /// Successful attaches, including the initial one and each reset.
    pub attaches: u64,
}

impl EngineCounts {
    pub(crate) fn read(counters: &Counters, attaches: u64) -> Self {
        Self {
            lines: counters.lines.load(Ordering::Relaxed),
            source_requests: counters.source_requests.load(Ordering::Relaxed),
            source_misses: counters.source_misses.load(Ordering::Relaxed),
            samples: counters.samples.load(Ordering::Relaxed),
            attaches,
        }
    }
}

/// Collects phase timings and result sizes.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub plots: usize,
    pub vectors: usize,
    pub skipped: usize,
    pub counts: EngineCounts,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            plots: 0,
            vectors: 0,
            skipped: 0,
            counts: EngineCounts::default(),
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    pub fn record_results(&mut self, results: &Results) {
        self.plots = results.data.len();
        self.vectors = results.data.iter().map(|(_, p)| p.len()).sum();
        self.skipped = results.skipped.len();
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Ohmlink Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Plots:                  {}", self.plots);
        eprintln!("  Vectors:                {}  skipped={}", self.vectors, self.skipped);
        eprintln!("  Output lines:           {}", self.counts.lines);
        if self.counts.source_requests > 0 {
            eprintln!(
                "  Source requests:        {}  undefined={}",
                self.counts.source_requests, self.counts.source_misses
            );
        }
        if self.counts.samples > 0 {
            eprintln!("  Streamed samples:       {}", self.counts.samples);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}
