//! # Factorial — n!±1
//!
//! Unlike [`crate::families::kbn`]/[`crate::families::twin`]/
//! [`crate::families::carol_kynea`], there is no discrete log here: `n!`
//! isn't a power of a fixed base, so BSGS doesn't apply. Instead, for a
//! prime `p`, `n! mod p` is zero for every `n >= p` (the product picks up a
//! factor of `p` at `n=p` and never loses it), so only `n` in
//! `n_min..=min(n_max, p-1)` can possibly satisfy `n! ≡ -1` or `n! ≡ 1 (mod
//! p)`. For each incoming prime this module walks that bounded window
//! directly, checking both signs in the same pass.
//!
//! Grounded in the teacher's `FactorialSieve` (`entries: Vec<(u64, u64)>`
//! tracking `n! mod p`, `advance`, `check_composites`), adapted from its
//! "advance by n, shared across all primes" loop to "recompute the window
//! per incoming prime" since this engine's driver streams primes, not n
//! (spec §4.4). The teacher's separate Wilson's-theorem special case
//! (`sieve_primes.binary_search(&(n+1))`) is not reproduced as its own
//! step: it falls out for free here, since `p == n+1` dividing `n!+1` is
//! exactly the `n = p-1` case of the same window walk — Wilson's theorem is
//! *why* that case always hits, not a separate code path.

use crate::bitmap::{PackedBitmap, TermBitmap};
use crate::error::CoreError;
use crate::family::{EliminationRecord, FactorEvent, FamilySieve};
use std::io::Write;

pub struct FactorialFamily {
    n_min: u64,
    n_max: u64,
    plus_bitmap: PackedBitmap,
    minus_bitmap: PackedBitmap,
    single_worker_threshold: u64,
}

impl FactorialFamily {
    pub fn new(n_min: u64, n_max: u64, single_worker_threshold: u64) -> Self {
        assert!(n_max >= n_min);
        let len = (n_max - n_min + 1) as usize;
        FactorialFamily {
            n_min,
            n_max,
            plus_bitmap: PackedBitmap::new_all_set(len),
            minus_bitmap: PackedBitmap::new_all_set(len),
            single_worker_threshold,
        }
    }

    fn coord_of(&self, n: u64) -> Option<usize> {
        if n < self.n_min || n > self.n_max {
            return None;
        }
        Some((n - self.n_min) as usize)
    }

    fn term_string(n: u64, sign: i64) -> String {
        format!("{}!{:+}", n, sign)
    }

    /// Walk `n` from 1 up to `min(n_max, p-1)`, tracking `n! mod p`
    /// incrementally, and record every `n >= n_min` where the residue hits
    /// `p-1` (divides `n!+1`) or `1` (divides `n!-1`).
    fn scan_prime(&self, p: u64) -> Vec<(u64, i64)> {
        if p < 2 {
            return Vec::new();
        }
        let upper = self.n_max.min(p - 1);
        if upper < self.n_min {
            return Vec::new();
        }
        let mut hits = Vec::new();
        let mut fm = 1u64;
        for n in 1..=upper {
            fm = fm * (n % p) % p;
            if n < self.n_min {
                continue;
            }
            if fm == p - 1 {
                hits.push((n, 1i64));
            }
            if fm == 1 {
                hits.push((n, -1i64));
            }
        }
        hits
    }
}

impl FamilySieve for FactorialFamily {
    fn name(&self) -> &'static str {
        "factorial"
    }

    fn on_prime_chunk(&self, primes: &[u64]) -> Vec<FactorEvent> {
        let mut events = Vec::new();
        for &p in primes {
            for (n, sign) in self.scan_prime(p) {
                let Some(coord) = self.coord_of(n) else {
                    continue;
                };
                let bitmap = if sign < 0 {
                    &self.minus_bitmap
                } else {
                    &self.plus_bitmap
                };
                if bitmap.get(coord) && bitmap.report_factor(coord, p, self.single_worker_threshold)
                {
                    events.push(FactorEvent {
                        p,
                        coord: (n << 1) | u64::from(sign < 0),
                        term: Self::term_string(n, sign),
                    });
                }
            }
        }
        events
    }

    fn verify_factor(&self, p: u64, coord: u64) -> Result<(), CoreError> {
        let n = coord >> 1;
        let sign: i64 = if coord & 1 == 1 { -1 } else { 1 };
        if p < 2 || n >= p {
            return Err(CoreError::VerifyFailure {
                p,
                term: Self::term_string(n, sign),
                reason: "p must be prime and greater than n for n! mod p to be meaningful".into(),
            });
        }
        let mut fm = 1u64;
        for i in 1..=n {
            fm = fm * (i % p) % p;
        }
        let total = (fm as i64 + sign).rem_euclid(p as i64);
        if total != 0 {
            return Err(CoreError::VerifyFailure {
                p,
                term: Self::term_string(n, sign),
                reason: format!("n!{:+} mod p = {}, expected 0", sign, total),
            });
        }
        Ok(())
    }

    fn write_terms(&self, writer: &mut dyn Write, largest_prime: u64) -> Result<(), CoreError> {
        writer
            .write_all(
                crate::terms_io::format_abc_header("$a!+1 / $a!-1", largest_prime).as_bytes(),
            )
            .map_err(|e| CoreError::io("factorial terms", e))?;
        for n in self.n_min..=self.n_max {
            let Some(coord) = self.coord_of(n) else {
                continue;
            };
            if self.plus_bitmap.get(coord) {
                writeln!(writer, "{} +1", n).map_err(|e| CoreError::io("factorial terms", e))?;
            }
            if self.minus_bitmap.get(coord) {
                writeln!(writer, "{} -1", n).map_err(|e| CoreError::io("factorial terms", e))?;
            }
        }
        Ok(())
    }

    fn apply_prefactored(&self, _factor: u64, term_string: &str) -> bool {
        let Some((n, sign)) = parse_term(term_string) else {
            return false;
        };
        let Some(coord) = self.coord_of(n) else {
            return false;
        };
        if sign < 0 {
            self.minus_bitmap.clear(coord)
        } else {
            self.plus_bitmap.clear(coord)
        }
    }

    fn term_count(&self) -> u64 {
        self.plus_bitmap.count() + self.minus_bitmap.count()
    }

    fn factor_count(&self) -> u64 {
        self.plus_bitmap.factor_count() + self.minus_bitmap.factor_count()
    }

    fn elimination_records(&self) -> &[EliminationRecord] {
        &[]
    }
}

/// Pull `(n, sign)` out of `"<n>!+1"` / `"<n>!-1"`.
fn parse_term(term: &str) -> Option<(u64, i64)> {
    let bang = term.find('!')?;
    let n = term[..bang].parse::<u64>().ok()?;
    let rest = &term[bang + 1..];
    let sign = if rest.starts_with('-') { -1 } else { 1 };
    Some((n, sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_factor_of_4_factorial_plus_1() {
        // 4!+1 = 25 = 5^2.
        let fam = FactorialFamily::new(1, 10, 1_000_000);
        let events = fam.on_prime_chunk(&[2, 3, 5, 7]);
        assert!(events
            .iter()
            .any(|e| e.p == 5 && e.term == "4!+1"));
    }

    #[test]
    fn finds_known_factor_of_5_factorial_plus_1() {
        // 5!+1 = 121 = 11^2.
        let fam = FactorialFamily::new(1, 10, 1_000_000);
        let events = fam.on_prime_chunk(&[11]);
        assert!(events.iter().any(|e| e.p == 11 && e.term == "5!+1"));
    }

    #[test]
    fn wilson_case_is_found_by_the_general_scan() {
        // p=n+1=14 is not prime, but p=n+1=6 isn't prime either; use a real
        // Wilson instance: n=4, p=5: 4! = 24 = -1 mod 5, so 5 | 4!+1.
        let fam = FactorialFamily::new(1, 10, 1_000_000);
        let events = fam.on_prime_chunk(&[5]);
        assert!(events.iter().any(|e| e.p == 5 && e.term == "4!+1"));
    }

    #[test]
    fn large_prime_beyond_range_clips_window_without_panicking() {
        let fam = FactorialFamily::new(1, 5, 1_000_000);
        let events = fam.on_prime_chunk(&[101]);
        assert!(events.is_empty());
    }

    #[test]
    fn verify_factor_accepts_real_factor_and_rejects_false_one() {
        let fam = FactorialFamily::new(1, 10, 1_000_000);
        let coord = (4u64 << 1) | 0;
        assert!(fam.verify_factor(5, coord).is_ok());
        let bad_coord = (3u64 << 1) | 0;
        assert!(fam.verify_factor(5, bad_coord).is_err());
    }

    #[test]
    fn apply_prefactored_clears_matching_term() {
        let fam = FactorialFamily::new(1, 10, 1_000_000);
        assert!(fam.apply_prefactored(5, "4!+1"));
        assert!(!fam.plus_bitmap.get(fam.coord_of(4).unwrap()));
    }
}
