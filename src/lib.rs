//! # mtsieve-core
//!
//! A small-prime sieving engine for parameterized integer families: given a
//! family shape (`k*b^n+c`, twin `k*b^n±1`, Carol/Kynea `(b^n±1)^2-2`,
//! `n!±1`, ...) and a range of primes `[pmin, pmax)`, finds every prime in
//! that range dividing some member of the family and removes that member
//! from the surviving-candidates bitmap.
//!
//! This crate does not prove primality of survivors, parse CLI arguments, or
//! talk to a database, dashboard, or remote coordinator — those are concerns
//! of a binary built on top of this core, not the core itself. What it does
//! own:
//!
//! - Montgomery modular arithmetic ([`montgomery`]) shared by every family's
//!   discrete-log search.
//! - A baby-step/giant-step engine ([`baby_giant`]) and the open-addressed
//!   hash table it shares across primes within a worker ([`hashtable`]).
//! - Packed survivor bitmaps with lock-free reads and threshold-gated
//!   concurrent writes ([`bitmap`]).
//! - The [`family::FamilySieve`] trait — the single seam a new family
//!   implements — and four concrete families covering the coordinate shapes
//!   that recur across the rest ([`families`]).
//! - A fixed worker pool ([`worker_pool`]), a segmented prime source
//!   ([`prime_source`]), and the driver loop that ties them together
//!   ([`driver`]).
//! - Checkpointing ([`checkpoint`]), append-only factor logging
//!   ([`factor_log`]), rolling factor-rate statistics ([`stats`]), terms-file
//!   parsing/formatting ([`terms_io`]), pre-sieve algebraic elimination
//!   ([`algebraic_elim`]), and a typed error taxonomy ([`error`]).

pub mod algebraic_elim;
pub mod baby_giant;
pub mod bitmap;
pub mod checkpoint;
pub mod driver;
pub mod error;
pub mod factor_log;
pub mod families;
pub mod family;
pub mod hashtable;
pub mod montgomery;
pub mod prime_source;
pub mod stats;
pub mod terms_io;
pub mod worker_pool;
