//! # Twin — k·b^n+1 and k·b^n−1, Simultaneous
//!
//! A twin candidate at `n` survives only while *both* `k*b^n+1` and
//! `k*b^n-1` remain free of a known small factor (spec §3.2: "k·b^n±1
//! simultaneously (twins): one 'twin' bit + optional separate +/- bits").
//! Reuses the same BSGS search as [`crate::families::kbn`] against two
//! target residues sharing one base.
//!
//! Grounded in the teacher's `twin.rs`, which already intersects two
//! `kbn::bsgs_sieve` calls (+1 form, −1 form) before testing; here the
//! intersection *is* the bitmap itself rather than a pre-test filter, since
//! primality testing of survivors is out of scope (spec §1).

use crate::baby_giant::{bsgs_search, StepPlan, DEFAULT_GIANT_STEP_FACTOR};
use crate::bitmap::{PackedBitmap, TermBitmap};
use crate::error::CoreError;
use crate::family::{EliminationRecord, FactorEvent, FamilySieve};
use crate::hashtable::HashTable;
use crate::montgomery::ModArith;
use std::io::Write;
use std::sync::Mutex;

pub struct TwinFamily {
    k: u64,
    base: u64,
    n_min: u64,
    n_max: u64,
    plus_bitmap: PackedBitmap,
    minus_bitmap: PackedBitmap,
    twin_bitmap: PackedBitmap,
    single_worker_threshold: u64,
    table: Mutex<HashTable>,
}

impl TwinFamily {
    pub fn new(k: u64, base: u64, n_min: u64, n_max: u64, single_worker_threshold: u64) -> Self {
        assert!(n_max >= n_min);
        let len = (n_max - n_min + 1) as usize;
        let range = len as u64;
        let plan = StepPlan::choose(range, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 24);
        TwinFamily {
            k,
            base,
            n_min,
            n_max,
            plus_bitmap: PackedBitmap::new_all_set(len),
            minus_bitmap: PackedBitmap::new_all_set(len),
            twin_bitmap: PackedBitmap::new_all_set(len),
            single_worker_threshold,
            table: Mutex::new(HashTable::for_elements(plan.m)),
        }
    }

    fn coord_of(&self, n: u64) -> Option<usize> {
        if n < self.n_min || n > self.n_max {
            return None;
        }
        Some((n - self.n_min) as usize)
    }

    fn term_string(&self, n: u64, sign: i64) -> String {
        format!("{}*{}^{}{:+}", self.k, self.base, n, sign)
    }

    /// Solve `base^n = target` for one sign's target residue, returning the
    /// surviving n's this prime divides that form at.
    fn search_sign(&self, ctx: &ModArith, base_inv: u64, sign: i64) -> Vec<u64> {
        let p = ctx.modulus();
        let k_res = ctx.to_residue(self.k);
        if k_res == 0 {
            return Vec::new();
        }
        let inv_k = match ctx.inverse(k_res) {
            Some(v) => v,
            None => return Vec::new(),
        };
        let neg_c = (-sign).rem_euclid(p as i64) as u64;
        let target = ctx.mul(ctx.to_residue(neg_c), inv_k);
        // Shift by base_inv^n_min: see kbn.rs's search_prime for why.
        let target = ctx.mul(target, ctx.pow(base_inv, self.n_min));

        let range = self.n_max - self.n_min + 1;
        let plan = StepPlan::choose(range, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 24);
        let mut table = self.table.lock().unwrap();
        let hits = bsgs_search(ctx, base_inv, target, 1, plan, &mut table);

        let mut ns = Vec::new();
        for hit in hits {
            let n_rel = plan.m as i64 * hit.i as i64 - hit.j as i64;
            if n_rel < 0 || n_rel as u64 > range - 1 {
                continue;
            }
            ns.push(self.n_min + n_rel as u64);
        }
        ns
    }
}

impl FamilySieve for TwinFamily {
    fn name(&self) -> &'static str {
        "twin"
    }

    fn on_prime_chunk(&self, primes: &[u64]) -> Vec<FactorEvent> {
        let mut events = Vec::new();
        for &p in primes {
            let ctx = ModArith::new(p);
            let base_res = ctx.to_residue(self.base);
            if base_res == 0 {
                continue;
            }
            let base_inv = match ctx.inverse(base_res) {
                Some(v) => v,
                None => continue,
            };

            for (sign, bitmap) in [(1i64, &self.plus_bitmap), (-1i64, &self.minus_bitmap)] {
                for n in self.search_sign(&ctx, base_inv, sign) {
                    let Some(coord) = self.coord_of(n) else {
                        continue;
                    };
                    if bitmap.get(coord) && bitmap.report_factor(coord, p, self.single_worker_threshold)
                    {
                        events.push(FactorEvent {
                            p,
                            // high bit encodes sign so verify_factor can recompute the exact form.
                            coord: (n << 1) | u64::from(sign < 0),
                            term: self.term_string(n, sign),
                        });
                        // A factor of either form eliminates the twin candidate at n.
                        self.twin_bitmap
                            .report_factor(coord, p, self.single_worker_threshold);
                    }
                }
            }
        }
        events
    }

    fn verify_factor(&self, p: u64, coord: u64) -> Result<(), CoreError> {
        let n = coord >> 1;
        let sign: i64 = if coord & 1 == 1 { -1 } else { 1 };
        let ctx = ModArith::new(p);
        let base_res = ctx.to_residue(self.base % p);
        let k_res = ctx.to_residue(self.k % p);
        let term_res = ctx.mul(k_res, ctx.pow(base_res, n));
        let value = ctx.from_residue(term_res) as i64;
        let total = (value + sign).rem_euclid(p as i64);
        if total != 0 {
            return Err(CoreError::VerifyFailure {
                p,
                term: self.term_string(n, sign),
                reason: format!("k*b^n{:+} mod p = {}, expected 0", sign, total),
            });
        }
        Ok(())
    }

    fn write_terms(&self, writer: &mut dyn Write, largest_prime: u64) -> Result<(), CoreError> {
        let template = format!("{}*{}^%u+1 & {}*{}^%u-1", self.k, self.base, self.k, self.base);
        writer
            .write_all(
                crate::terms_io::format_abcd_header(&template, self.k as i64, largest_prime)
                    .as_bytes(),
            )
            .map_err(|e| CoreError::io("twin terms", e))?;
        for n in self.n_min..=self.n_max {
            if let Some(coord) = self.coord_of(n) {
                if self.twin_bitmap.get(coord) {
                    writeln!(writer, "{}", n).map_err(|e| CoreError::io("twin terms", e))?;
                }
            }
        }
        Ok(())
    }

    fn apply_prefactored(&self, _factor: u64, term_string: &str) -> bool {
        let Some((n, sign)) = parse_n_and_sign(term_string) else {
            return false;
        };
        let Some(coord) = self.coord_of(n) else {
            return false;
        };
        let bitmap = if sign < 0 {
            &self.minus_bitmap
        } else {
            &self.plus_bitmap
        };
        let cleared = bitmap.clear(coord);
        if cleared {
            self.twin_bitmap.clear(coord);
        }
        cleared
    }

    fn term_count(&self) -> u64 {
        self.twin_bitmap.count()
    }

    fn factor_count(&self) -> u64 {
        self.plus_bitmap.factor_count() + self.minus_bitmap.factor_count()
    }

    fn elimination_records(&self) -> &[EliminationRecord] {
        &[]
    }
}

fn parse_n_and_sign(term: &str) -> Option<(u64, i64)> {
    let caret = term.find('^')?;
    let rest = &term[caret + 1..];
    let end = rest.find(['+', '-'])?;
    let n = rest[..end].parse::<u64>().ok()?;
    let sign = if rest.as_bytes()[end] == b'-' { -1 } else { 1 };
    Some((n, sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_factor_of_plus_form() {
        // 3*2^2+1 = 13, prime, divides itself.
        let fam = TwinFamily::new(3, 2, 1, 20, 1_000_000);
        let events = fam.on_prime_chunk(&[13]);
        assert!(events.iter().any(|e| e.p == 13 && e.term.ends_with("+1")));
    }

    #[test]
    fn factor_of_either_form_clears_twin_bit() {
        let fam = TwinFamily::new(3, 2, 1, 20, 1_000_000);
        fam.on_prime_chunk(&[13]);
        let coord = fam.coord_of(2).unwrap();
        assert!(!fam.twin_bitmap.get(coord));
    }

    #[test]
    fn verify_factor_checks_correct_sign() {
        let fam = TwinFamily::new(3, 2, 1, 20, 1_000_000);
        let coord_plus = (2u64 << 1) | 0;
        assert!(fam.verify_factor(13, coord_plus).is_ok());
        let coord_minus = (2u64 << 1) | 1;
        assert!(fam.verify_factor(13, coord_minus).is_err());
    }

    #[test]
    fn surviving_terms_exclude_factored_n() {
        let fam = TwinFamily::new(3, 2, 1, 10, 1_000_000);
        fam.on_prime_chunk(&[13]);
        let mut buf = Vec::new();
        fam.write_terms(&mut buf, 1000).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.lines().any(|l| l == "2"));
    }
}
