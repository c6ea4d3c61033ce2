//! # Stats — Factor-Rate Ring Buffer and Early-Termination Trigger
//!
//! A ring of `(timestamp_us, cumulative_factor_count)` samples. After each
//! worker chunk a sample is appended; once the ring is full the oldest is
//! evicted by shifting (spec §4.10). Rate derivation prefers factors/second
//! when the recent rate is at least one per second, and falls back to
//! seconds/factor otherwise — matching the crossover the source's
//! `FactorApp::BuildFactorsPerSecondRateString` /
//! `BuildSecondsPerFactorRateString` implement.
//!
//! Grounded directly in `core/FactorApp.cpp`'s `ir_ReportStatus` ring
//! (`MAX_FACTOR_REPORT_COUNT = 60*5*24`, one sample per minute of headroom
//! for a full 5-day run before the oldest sample is dropped).

use std::time::Duration;

/// `60 * 5 * 24`: five days of one-per-minute samples (source constant).
pub const MAX_SAMPLES: usize = 60 * 5 * 24;

#[derive(Debug, Clone, Copy)]
struct Sample {
    ts_us: u64,
    factor_count: u64,
}

pub struct Stats {
    samples: Vec<Sample>,
    minutes_for_spf: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// Factors per second, with the number of whole minutes of history used.
    PerSecond(f64, u32),
    /// Seconds per factor, with the number of whole minutes of history used.
    PerFactor(f64, u32),
    /// No factors have been found in any retained window yet.
    NoData,
}

impl Stats {
    pub fn new(minutes_for_spf: u32) -> Self {
        Stats {
            samples: Vec::new(),
            minutes_for_spf: minutes_for_spf.max(1),
        }
    }

    /// Append a sample. If the ring is full, the oldest is dropped
    /// (spec §4.10: "the oldest is evicted once full").
    pub fn record(&mut self, ts_us: u64, factor_count: u64) {
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.remove(0);
        }
        self.samples.push(Sample {
            ts_us,
            factor_count,
        });
    }

    /// Derive the current rate over a representative tail window, adjusted
    /// for `cpu_utilization` (cores in active use), mirroring the source's
    /// minute-by-minute backoff when a window contains zero factors.
    pub fn current_rate(&self, cpu_utilization: f64) -> Rate {
        let cpu_utilization = cpu_utilization.max(0.01);
        let n = self.samples.len();
        if n < 2 {
            return Rate::NoData;
        }
        let current = self.samples[n - 1];

        // factors-per-second pass: walk back one sample (~one minute) at a
        // time until a window with >=1 factor is found.
        let mut idx = n - 1;
        loop {
            if idx == 0 {
                break;
            }
            idx -= 1;
            let prev = self.samples[idx];
            let dt_us = current.ts_us.saturating_sub(prev.ts_us);
            let df = current.factor_count.saturating_sub(prev.factor_count);
            if df == 0 {
                if idx == 0 {
                    return Rate::NoData;
                }
                continue;
            }
            let adjusted_seconds = (dt_us as f64 * cpu_utilization) / 1_000_000.0;
            if (df as f64) >= adjusted_seconds {
                let per_us = (df as f64) / (dt_us.max(1) as f64) / cpu_utilization;
                return Rate::PerSecond(per_us * 1_000_000.0, (n - 1 - idx) as u32);
            }
            break;
        }

        // seconds-per-factor pass: extend the window until it spans at
        // least `minutes_for_spf` samples or a factor is found.
        let mut idx = n - 1;
        loop {
            if idx == 0 {
                break;
            }
            idx -= 1;
            let prev = self.samples[idx];
            let dt_us = current.ts_us.saturating_sub(prev.ts_us);
            let df = current.factor_count.saturating_sub(prev.factor_count);
            if df == 0 {
                if idx == 0 {
                    return Rate::NoData;
                }
                continue;
            }
            let spf = (dt_us as f64 / df as f64 / 1_000_000.0) * cpu_utilization;
            if (n - 1 - idx) as u32 >= self.minutes_for_spf {
                return Rate::PerFactor(spf, (n - 1 - idx) as u32);
            }
        }
        Rate::NoData
    }

    /// Evaluate the current rate against the user targets from spec §6.4
    /// (`-4 fps_target`, `-5 spf_target`). Returns `Some(reason)` if the
    /// driver should raise `RateBelowTarget`.
    pub fn check_targets(
        &self,
        cpu_utilization: f64,
        fps_target: Option<f64>,
        spf_target: Option<f64>,
    ) -> Option<(f64, f64, &'static str)> {
        match self.current_rate(cpu_utilization) {
            Rate::PerSecond(fps, _) => {
                if let Some(target) = fps_target {
                    if fps < target {
                        return Some((fps, target, "f/s"));
                    }
                }
                None
            }
            Rate::PerFactor(spf, _) => {
                if let Some(target) = spf_target {
                    if spf > target {
                        return Some((spf, target, "s/f"));
                    }
                }
                None
            }
            Rate::NoData => None,
        }
    }
}

pub fn micros_since(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

pub fn duration_to_micros(d: Duration) -> u64 {
    d.as_micros() as u64
}
