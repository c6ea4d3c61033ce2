//! # TermBitmap — Shared Remaining-Terms Bitmap
//!
//! A packed bit array shared across workers. Reads never synchronize — they
//! may observe a stale 1 that is about to become a 0, but never a phantom 1
//! (spec §4.3). Writes (clearing a bit on factor discovery) are serialized
//! through a coarse mutex once the reporting prime exceeds a family-specific
//! single-worker threshold; below that threshold the driver guarantees only
//! one worker is active, so the same atomic clear is safe without the lock.
//!
//! Grounded in the teacher's `sieve::BitSieve` (packed `Vec<u64>`, POPCNT
//! counting, `iter_set_bits`), extended with the atomics and counters the
//! concurrency contract in spec §4.3/§5 requires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Per-family clear/count capability (spec §9 design note: "the core only
/// requires `fn clear(&mut self, coord) -> bool` and `fn count(&self) -> u64`").
pub trait TermBitmap: Send + Sync {
    fn clear(&self, coord: usize) -> bool;
    fn count(&self) -> u64;
}

pub struct PackedBitmap {
    words: Vec<AtomicU64>,
    len: usize,
    term_count: AtomicU64,
    factor_count: AtomicU64,
    slow_path: Mutex<()>,
}

impl PackedBitmap {
    pub fn new_all_set(len: usize) -> Self {
        let num_words = len.div_ceil(64);
        let mut words: Vec<AtomicU64> = (0..num_words).map(|_| AtomicU64::new(u64::MAX)).collect();
        let extra = num_words * 64 - len;
        if extra > 0 && num_words > 0 {
            let last = num_words - 1;
            words[last] = AtomicU64::new(u64::MAX >> extra);
        }
        PackedBitmap {
            words,
            len,
            term_count: AtomicU64::new(len as u64),
            factor_count: AtomicU64::new(0),
            slow_path: Mutex::new(()),
        }
    }

    pub fn new_all_clear(len: usize) -> Self {
        let num_words = len.div_ceil(64);
        PackedBitmap {
            words: (0..num_words).map(|_| AtomicU64::new(0)).collect(),
            len,
            term_count: AtomicU64::new(0),
            factor_count: AtomicU64::new(0),
            slow_path: Mutex::new(()),
        }
    }

    /// Build directly from a bit-count and an iterator of set indices, as
    /// used when reloading a checkpoint (spec §8 round-trip property).
    pub fn from_set_indices(len: usize, set: impl Iterator<Item = usize>) -> Self {
        let bm = PackedBitmap::new_all_clear(len);
        let mut n = 0u64;
        for idx in set {
            if bm.set_raw(idx) {
                n += 1;
            }
        }
        bm.term_count.store(n, Ordering::Relaxed);
        bm
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unsynchronized read: may see a stale 1, never a phantom 1.
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        let w = self.words[idx / 64].load(Ordering::Acquire);
        w & (1u64 << (idx % 64)) != 0
    }

    fn set_raw(&self, idx: usize) -> bool {
        let mask = 1u64 << (idx % 64);
        let prev = self.words[idx / 64].fetch_or(mask, Ordering::AcqRel);
        prev & mask == 0
    }

    fn clear_raw(&self, idx: usize) -> bool {
        let mask = 1u64 << (idx % 64);
        let prev = self.words[idx / 64].fetch_and(!mask, Ordering::AcqRel);
        prev & mask != 0
    }

    /// `factor_count` and `term_count` as of the last quiescent boundary
    /// (Invariant B2 holds exactly when no worker is mid-update).
    pub fn factor_count(&self) -> u64 {
        self.factor_count.load(Ordering::Relaxed)
    }

    /// Report one factor at `coord`. Below `threshold`, the driver guarantees
    /// single-writer access so the atomic clear needs no lock; above it,
    /// a coarse mutex serializes the clear-and-count update (BW1: both
    /// updated together).
    pub fn report_factor(&self, coord: usize, current_prime: u64, threshold: u64) -> bool {
        let cleared = if current_prime > threshold {
            let _guard = self.slow_path.lock().unwrap();
            self.clear_raw(coord)
        } else {
            self.clear_raw(coord)
        };
        if cleared {
            self.term_count.fetch_sub(1, Ordering::Relaxed);
            self.factor_count.fetch_add(1, Ordering::Relaxed);
        }
        cleared
    }

    /// Report a factor that clears many bits in one critical section:
    /// `start, start+stride, start+2*stride, ..., <= max` (spec §4.3, used
    /// by Twin/Cunningham-shaped families where one prime divides a whole
    /// residue class of k). Returns the number of 1->0 transitions.
    pub fn report_factor_strided(
        &self,
        start: usize,
        stride: usize,
        max: usize,
        current_prime: u64,
        threshold: u64,
    ) -> u64 {
        let sweep = |bm: &Self| -> u64 {
            let mut n = 0u64;
            let mut k = start;
            while k <= max {
                if bm.clear_raw(k) {
                    n += 1;
                }
                k = match k.checked_add(stride) {
                    Some(v) => v,
                    None => break,
                };
            }
            n
        };
        let cleared = if current_prime > threshold {
            let _guard = self.slow_path.lock().unwrap();
            sweep(self)
        } else {
            sweep(self)
        };
        if cleared > 0 {
            self.term_count.fetch_sub(cleared, Ordering::Relaxed);
            self.factor_count.fetch_add(cleared, Ordering::Relaxed);
        }
        cleared
    }

    pub fn iter_set_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, word)| {
            let base = wi * 64;
            BitIter {
                word: word.load(Ordering::Acquire),
                base,
            }
        })
    }
}

impl TermBitmap for PackedBitmap {
    fn clear(&self, coord: usize) -> bool {
        let cleared = self.clear_raw(coord);
        if cleared {
            self.term_count.fetch_sub(1, Ordering::Relaxed);
        }
        cleared
    }

    fn count(&self) -> u64 {
        self.term_count.load(Ordering::Relaxed)
    }
}

struct BitIter {
    word: u64,
    base: usize,
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            return None;
        }
        let tz = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(self.base + tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn all_set_counts_len() {
        let bm = PackedBitmap::new_all_set(130);
        assert_eq!(bm.count(), 130);
        assert_eq!(bm.iter_set_bits().count(), 130);
    }

    #[test]
    fn clear_is_idempotent_on_count() {
        let bm = PackedBitmap::new_all_set(10);
        assert!(bm.report_factor(3, 1, 10_000));
        assert!(!bm.report_factor(3, 1, 10_000));
        assert_eq!(bm.count(), 9);
        assert_eq!(bm.factor_count(), 1);
    }

    #[test]
    fn strided_clear_counts_all_transitions() {
        let bm = PackedBitmap::new_all_set(100);
        let cleared = bm.report_factor_strided(2, 7, 99, 1, 10_000);
        assert!(cleared > 1);
        assert_eq!(bm.count(), 100 - cleared);
    }

    #[test]
    fn from_set_indices_round_trips() {
        let bm = PackedBitmap::new_all_set(64);
        bm.report_factor(5, 1, 100);
        bm.report_factor(40, 1, 100);
        let remaining: Vec<usize> = bm.iter_set_bits().collect();
        let bm2 = PackedBitmap::from_set_indices(64, remaining.iter().copied());
        assert_eq!(bm2.count(), bm.count());
        let remaining2: Vec<usize> = bm2.iter_set_bits().collect();
        assert_eq!(remaining, remaining2);
    }

    #[test]
    fn concurrent_clears_above_threshold_never_double_count() {
        let bm = Arc::new(PackedBitmap::new_all_set(1000));
        let threshold = 0u64; // force slow path for every report
        let mut handles = vec![];
        for t in 0..8 {
            let bm = Arc::clone(&bm);
            handles.push(thread::spawn(move || {
                for i in (t..1000).step_by(8) {
                    bm.report_factor(i, 1, threshold);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(bm.count(), 0);
        assert_eq!(bm.factor_count(), 1000);
    }
}
