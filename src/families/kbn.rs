//! # Kbn — k·b^n+c, Fixed k/b/c, Variable n
//!
//! The representative `BabyGiantEngine` consumer: for a fixed `k`, `b`, `c`
//! and a range of exponents `n`, finds every prime `p` dividing some
//! `k*b^n+c` by solving the discrete log `b^n ≡ -c/k (mod p)` (spec §4.5).
//! Every other BSGS-shaped family (`twin`, `carol_kynea`, Sierpinski/Riesel)
//! reuses this same search against a different target residue.
//!
//! Grounded in the teacher's `kbn::bsgs_sieve` (same discrete-log-sieve
//! role, generalized here from "eliminate candidates before an LLR/Proth
//! test" to "the sole predicate", since primality proof of survivors is an
//! explicit non-goal for this crate, spec §1).

use crate::algebraic_elim::eliminate_kbn;
use crate::baby_giant::{bsgs_search, StepPlan, DEFAULT_GIANT_STEP_FACTOR};
use crate::bitmap::{PackedBitmap, TermBitmap};
use crate::error::CoreError;
use crate::family::{EliminationRecord, FactorEvent, FamilySieve};
use crate::hashtable::HashTable;
use crate::montgomery::ModArith;
use std::io::Write;
use std::sync::Mutex;

pub struct KbnFamily {
    k: u64,
    base: u64,
    c: i64,
    n_min: u64,
    n_max: u64,
    bitmap: PackedBitmap,
    single_worker_threshold: u64,
    elimination_records: Vec<EliminationRecord>,
    /// Protects the per-prime BSGS hash table; only one worker resizes/uses
    /// it at a time (spec §4.5: "cleared between primes, not reallocated").
    table: Mutex<HashTable>,
}

impl KbnFamily {
    /// `c` must be `+1` or `-1`; other values are accepted by `verify_factor`
    /// but only `|c|=1` gets the Jacobi parity pre-filter (spec §4.5).
    pub fn new(
        k: u64,
        base: u64,
        c: i64,
        n_min: u64,
        n_max: u64,
        single_worker_threshold: u64,
    ) -> Self {
        assert!(n_max >= n_min, "n_max must be >= n_min");
        let len = (n_max - n_min + 1) as usize;
        let bitmap = PackedBitmap::new_all_set(len);

        let elimination_records = eliminate_kbn(base, n_min, n_max);
        for rec in &elimination_records {
            bitmap.clear((rec.coord - n_min) as usize);
        }

        let range = len as u64;
        let plan = StepPlan::choose(range, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 24);
        KbnFamily {
            k,
            base,
            c,
            n_min,
            n_max,
            bitmap,
            single_worker_threshold,
            elimination_records,
            table: Mutex::new(HashTable::for_elements(plan.m)),
        }
    }

    fn term_string(&self, n: u64) -> String {
        format!("{}*{}^{}{:+}", self.k, self.base, n, self.c)
    }

    fn coord_of(&self, n: u64) -> Option<usize> {
        if n < self.n_min || n > self.n_max {
            return None;
        }
        Some((n - self.n_min) as usize)
    }

    /// `k*base^n mod p == -c`, solved as a discrete log `base^n = target`.
    fn search_prime(&self, p: u64) -> Vec<(u64, String)> {
        let ctx = ModArith::new(p);
        let k_res = ctx.to_residue(self.k);
        let base_res = ctx.to_residue(self.base);
        if k_res == 0 || base_res == 0 {
            return Vec::new();
        }

        let neg_c = (-self.c).rem_euclid(p as i64) as u64;

        let inv_k = match ctx.inverse(k_res) {
            Some(v) => v,
            None => return Vec::new(),
        };
        let target = ctx.mul(ctx.to_residue(neg_c), inv_k);
        let base_inv = match ctx.inverse(base_res) {
            Some(v) => v,
            None => return Vec::new(),
        };
        // Shift the target by base_inv^n_min so the search solves for `n -
        // n_min` (which BSGS's baby/giant-step window actually covers)
        // rather than the absolute `n`.
        let target = ctx.mul(target, ctx.pow(base_inv, self.n_min));

        let range = self.n_max - self.n_min + 1;
        let plan = StepPlan::choose(range, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 24);
        let mut table = self.table.lock().unwrap();
        let hits = bsgs_search(&ctx, base_inv, target, 1, plan, &mut table);

        let mut found = Vec::new();
        for hit in hits {
            // spec §4.5 point 4: n_rel = m*i - j, n = n_min + n_rel*Q + q, here Q=1, q=0.
            let n_rel = plan.m as i64 * hit.i as i64 - hit.j as i64;
            if n_rel < 0 || n_rel as u64 > range - 1 {
                continue;
            }
            let n = self.n_min + n_rel as u64;
            found.push((n, self.term_string(n)));
        }
        found
    }
}

impl FamilySieve for KbnFamily {
    fn name(&self) -> &'static str {
        "kbn"
    }

    fn on_prime_chunk(&self, primes: &[u64]) -> Vec<FactorEvent> {
        let mut events = Vec::new();
        for &p in primes {
            for (n, term) in self.search_prime(p) {
                let Some(coord) = self.coord_of(n) else {
                    continue;
                };
                if self.bitmap.get(coord)
                    && self
                        .bitmap
                        .report_factor(coord, p, self.single_worker_threshold)
                {
                    events.push(FactorEvent { p, coord: n, term });
                }
            }
        }
        events
    }

    fn verify_factor(&self, p: u64, coord: u64) -> Result<(), CoreError> {
        let ctx = ModArith::new(p);
        let base_res = ctx.to_residue(self.base % p);
        let k_res = ctx.to_residue(self.k % p);
        let term_res = ctx.mul(k_res, ctx.pow(base_res, coord));
        let value = ctx.from_residue(term_res) as i64;
        let total = (value + self.c).rem_euclid(p as i64);
        if total != 0 {
            return Err(CoreError::VerifyFailure {
                p,
                term: self.term_string(coord),
                reason: format!("k*b^n+c mod p = {}, expected 0", total),
            });
        }
        Ok(())
    }

    fn write_terms(&self, writer: &mut dyn Write, largest_prime: u64) -> Result<(), CoreError> {
        let template = format!("{}*{}^$b{:+}", self.k, self.base, self.c);
        writer
            .write_all(crate::terms_io::format_abc_header(&template, largest_prime).as_bytes())
            .map_err(|e| CoreError::io("kbn terms", e))?;
        for n in self.n_min..=self.n_max {
            if let Some(coord) = self.coord_of(n) {
                if self.bitmap.get(coord) {
                    writeln!(writer, "{}", n).map_err(|e| CoreError::io("kbn terms", e))?;
                }
            }
        }
        Ok(())
    }

    fn apply_prefactored(&self, _factor: u64, term_string: &str) -> bool {
        let Some(n) = parse_n_from_term(term_string) else {
            return false;
        };
        match self.coord_of(n) {
            Some(coord) => self.bitmap.clear(coord),
            None => false,
        }
    }

    fn term_count(&self) -> u64 {
        self.bitmap.count()
    }

    fn factor_count(&self) -> u64 {
        self.bitmap.factor_count()
    }

    fn elimination_records(&self) -> &[EliminationRecord] {
        &self.elimination_records
    }
}

/// Pull `n` out of `"k*base^n+c"` / `"k*base^n-c"` as written by `term_string`.
fn parse_n_from_term(term: &str) -> Option<u64> {
    let caret = term.find('^')?;
    let rest = &term[caret + 1..];
    let end = rest.find(['+', '-'])?;
    rest[..end].parse::<u64>().ok()
}
