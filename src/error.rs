//! # Error — Typed Failure Taxonomy
//!
//! One variant per failure kind the driver and its collaborators can raise.
//! `main`-equivalents (the CLI binaries that embed this core) map these to
//! process exit codes; the core itself never calls `std::process::exit`.
//!
//! Fatal kinds (`ConfigError`, `ParseError`, `IoError`, `VerifyFailure`,
//! `TermCountMismatch`) propagate as `Err`. The two "clean interrupt" kinds
//! (`RateBelowTarget`, `UserInterrupt`) are not really errors — they are
//! carried through the same enum because the driver's main loop exits through
//! one `Result`-shaped path either way, but callers should treat them as a
//! successful, deliberate stop (exit code 0) rather than a failure.

use thiserror::Error;

/// A reported factor that failed independent re-verification: `(p, term)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailingTuple {
    pub p: u64,
    pub term: String,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("io error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("verification failed for factor {p} | {term}: {reason}")]
    VerifyFailure {
        p: u64,
        term: String,
        reason: String,
    },

    #[error("term count mismatch at checkpoint close: counted {counted} on disk, cached {cached}")]
    TermCountMismatch { counted: u64, cached: u64 },

    #[error("factor rate below target: {observed:.4} vs target {target:.4} ({unit})")]
    RateBelowTarget {
        observed: f64,
        target: f64,
        unit: &'static str,
    },

    #[error("interrupted by user")]
    UserInterrupt,
}

impl CoreError {
    /// `true` for the two kinds that represent a clean, intentional stop
    /// rather than a fatal failure (spec §7: exit 0, not exit 1).
    pub fn is_clean_interrupt(&self) -> bool {
        matches!(
            self,
            CoreError::RateBelowTarget { .. } | CoreError::UserInterrupt
        )
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        CoreError::IoError {
            path: path.into(),
            source,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
