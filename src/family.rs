//! # FamilySieve — Per-Family Predicate Trait
//!
//! Every integer family (`k*b^n+c`, Carol/Kynea, twin pairs, factorial, ...)
//! implements this trait. The core drives it generically: stream primes in,
//! collect `FactorEvent`s, verify, log, checkpoint (spec §4.4).
//!
//! `setup` from spec §4.4 is realized per family as its own `::new(...)`
//! constructor rather than a trait method — each family's setup takes a
//! different parameter shape (k/b/n-range for `kbn`, base/n-range for
//! `carol_kynea`, ...), and a one-size-fits-all `setup(pmin, pmax, options)`
//! signature would force every family through an untyped options bag the
//! corpus never reaches for. This is recorded as an Open Question resolution
//! in DESIGN.md.

use crate::error::CoreError;
use std::io::Write;

/// The `(p, coord)` tuple emitted by a family predicate (spec Glossary).
/// `coord` is a family-private packed encoding of whatever coordinate space
/// spec §3.2 assigns that family (a single `n`, a `(n, sign)` pair, etc.);
/// the core never interprets it — only the owning family does, in
/// `verify_factor`, `write_terms`, and the bitmap it already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorEvent {
    pub p: u64,
    pub coord: u64,
    /// Printable form for the factor log, e.g. `"12345*2^9876+1"` (spec §6.3).
    pub term: String,
}

/// One removed term during the pre-sieve algebraic elimination pass
/// (spec §4.11): every removed term carries a reason so downstream
/// consumers see one unified "reason" stream regardless of which
/// algebraic identity triggered the removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationRecord {
    pub coord: u64,
    pub reason: &'static str,
}

pub trait FamilySieve: Send + Sync {
    /// Family name for logging and checkpoint headers.
    fn name(&self) -> &'static str;

    /// Given a chunk of ascending primes, emit factor events. Pure with
    /// respect to the family's non-bitmap state — the only mutation this
    /// performs is clearing bits in the family's own `TermBitmap`, which the
    /// family holds and which handles its own synchronization (spec §4.4).
    fn on_prime_chunk(&self, primes: &[u64]) -> Vec<FactorEvent>;

    /// Independently recompute the family's polynomial at `coord` modulo
    /// `p` and assert it is zero. Every reported factor is verified before
    /// being recorded (spec §4.4, §8).
    fn verify_factor(&self, p: u64, coord: u64) -> Result<(), CoreError>;

    /// Emit the family's persistence format (spec §6.1/§6.2).
    fn write_terms(&self, writer: &mut dyn Write, largest_prime: u64) -> Result<(), CoreError>;

    /// Parse one line from an external factor file and clear the matching
    /// bit if present (spec §4.4, §6.3 input factors file).
    fn apply_prefactored(&self, factor: u64, term_string: &str) -> bool;

    /// Current count of remaining (unfactored) terms.
    fn term_count(&self) -> u64;

    /// Total factors reported so far.
    fn factor_count(&self) -> u64;

    /// Whether a faster specialised algorithm now applies given the largest
    /// prime tested so far (spec §4.8 rebuild trigger).
    fn rebuild_needed(&self, largest_tested: u64) -> bool {
        let _ = largest_tested;
        false
    }

    /// Rebuild internal tables for the current largest tested prime.
    fn rebuild(&self, largest_tested: u64) {
        let _ = largest_tested;
    }

    /// Capability query replacing the source's runtime-aborting
    /// "not implemented" stubs (spec §9): does this family support batching
    /// four primes per lane through `Vec4ModArith`?
    fn supports_lane4(&self) -> bool {
        false
    }

    /// Algebraic eliminations already applied during setup, for the unified
    /// reason stream (spec §4.11). Most families apply eliminations once at
    /// construction and report them here; returns an empty slice if none.
    fn elimination_records(&self) -> &[EliminationRecord] {
        &[]
    }
}
