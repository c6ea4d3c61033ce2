//! # FactorLog — Append-Only Factor Record
//!
//! One line per 1->0 bitmap transition, `"<p> | <term>"`, flushed after
//! every write (spec §4.9, §6.3; grounded in `core/FactorApp::LogFactor`,
//! which writes and `fflush`es on every call so a crash never loses a
//! previously-reported factor).

use crate::error::CoreError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct FactorLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FactorLog {
    pub fn create_or_append(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::io(path.display().to_string(), e))?;
        Ok(FactorLog {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one record and flush immediately (Invariant BW2: the caller
    /// is responsible for calling this exactly once per 1->0 transition,
    /// typically from inside the same critical section that cleared the
    /// bit).
    pub fn log(&self, p: u64, term: &str) -> Result<(), CoreError> {
        let mut w = self.writer.lock().unwrap();
        writeln!(w, "{} | {}", p, term)
            .and_then(|_| w.flush())
            .map_err(|e| CoreError::io(self.path.display().to_string(), e))
    }
}
