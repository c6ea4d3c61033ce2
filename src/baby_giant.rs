//! # BabyGiantEngine — Generic Baby-Step/Giant-Step Discrete Log
//!
//! Solves `b^x == target (mod p)` for `x` in a bounded window, shared by
//! every `k*b^n+c`-shaped family (`kbn`, `twin`, `carol_kynea`; spec §4.5).
//!
//! Step-size selection is grounded in the source's
//! `AbstractSequenceHelper::ChooseSteps`/`EstimateWork`: minimise
//! `m + s*M` subject to `m*M >= r` (r = range of n divided by Q, s = number
//! of sequences sharing this base), giving `M = round(sqrt(giant_step_factor
//! * r / s))`, `m = ceil(r/M)`, clamped so `m` fits the hash table tier.

use crate::hashtable::HashTable;
use crate::montgomery::ModArith;

/// Default giant-step scoring factor (source: `giantStepFactor`, tunable per
/// app; 1.0 is the source's baseline before cost-model refinement).
pub const DEFAULT_GIANT_STEP_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct StepPlan {
    /// Baby-step count (table size).
    pub m: u32,
    /// Giant-step count.
    pub giant_steps: u32,
}

impl StepPlan {
    /// Choose `(m, giant_steps)` for a range-of-n `r` (already divided by the
    /// subsequence step `Q`) shared across `s` sequences, clamped to
    /// `hash_max_elts` (spec §4.5 point 2; source `ChooseSteps`).
    pub fn choose(r: u64, s: u32, giant_step_factor: f64, hash_max_elts: u32) -> StepPlan {
        let r = r.max(1);
        let s = s.max(1) as f64;
        let mut giant = ((giant_step_factor * r as f64 / s).sqrt().round() as u64).max(1);
        let mut baby = (r as f64 / giant as f64).ceil() as u64;
        if baby > hash_max_elts as u64 {
            giant = (r as f64 / hash_max_elts as f64).ceil() as u64;
            baby = (r as f64 / giant as f64).ceil() as u64;
            while baby > hash_max_elts as u64 {
                giant += 1;
                baby = (r as f64 / giant as f64).ceil() as u64;
            }
        }
        StepPlan {
            m: baby.max(1) as u32,
            giant_steps: giant.max(1) as u32,
        }
    }

    /// Work estimate for this plan and `s` sequences (source `EstimateWork`).
    pub fn estimated_work(&self, q: u64, s: u32) -> f64 {
        const BABY_WORK: f64 = 1.1;
        const GIANT_WORK: f64 = 1.0;
        const EXP_WORK: f64 = 0.5;
        const SUBSEQ_WORK: f64 = 1.0;
        let s = s as f64;
        self.m as f64 * BABY_WORK
            + s * (self.giant_steps.saturating_sub(1)) as f64 * GIANT_WORK
            + q as f64 * EXP_WORK
            + s * SUBSEQ_WORK
    }
}

/// One discrete-log hit: giant-step index `i`, baby-step index `j`. Given a
/// `target_residue` pre-shifted so that `base^x == target` for `x` relative
/// to the caller's own `n_min` (i.e. `target = true_target * base_inv^n_min`),
/// the caller recovers that relative `x` as `x = m*i - j`, then maps it to a
/// coordinate via `n = n_min + x*Q + q` (spec §4.5 point 4) — this module
/// knows nothing of the family's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub i: u32,
    pub j: u32,
}

/// Run one BSGS search for a single sequence's target residue against a
/// shared base. `base_inv_residue` and `target_residue` are Montgomery
/// residues under `ctx`. `table` is cleared and rebuilt (baby steps) before
/// the giant-step scan (ordering contract: baby-step insertions strictly
/// precede giant-step lookups, spec §4.5).
///
/// Detects the case where the order of `b^Q` mod p divides the baby-step
/// window (a repeat of the starting residue before `m` insertions) and, for
/// every hit, also emits `j + k*order` for all `k` within the table's range
/// (spec §4.5 ordering contract).
pub fn bsgs_search(
    ctx: &ModArith,
    base_inv_residue: u64,
    target_residue: u64,
    q: u64,
    plan: StepPlan,
    table: &mut HashTable,
) -> Vec<Hit> {
    table.clear();

    let step = ctx.pow(base_inv_residue, q);
    let mut cur = ctx.one();
    let mut order: Option<u32> = None;
    table.insert(cur, 0);
    for j in 1..plan.m {
        cur = ctx.mul(cur, step);
        if cur == ctx.one() {
            order = Some(j);
            break;
        }
        table.insert(cur, j);
    }

    let giant_step_multiplier = ctx.pow(step, plan.m as u64);
    let mut gamma = target_residue;
    let mut hits = Vec::new();
    for i in 0..=plan.giant_steps {
        let j = table.lookup(gamma);
        if j != crate::hashtable::NOT_FOUND {
            hits.push(Hit { i, j });
            if let Some(ord) = order {
                let mut k = 1u32;
                while j + k * ord < plan.m {
                    hits.push(Hit {
                        i,
                        j: j + k * ord,
                    });
                    k += 1;
                }
            }
        }
        gamma = ctx.mul(gamma, giant_step_multiplier);
    }
    hits
}

/// Jacobi symbol `(a/n)` for odd positive `n`, used for the Legendre/Jacobi
/// parity pre-filtering in spec §4.5 ("skips the sequence for p if no
/// solution is possible").
pub fn jacobi_symbol(mut a: i64, mut n: u64) -> i32 {
    debug_assert!(n % 2 == 1 && n > 0);
    a = a.rem_euclid(n as i64);
    let mut result = 1i32;
    while a != 0 {
        while a % 2 == 0 {
            a /= 2;
            let r = n % 8;
            if r == 3 || r == 5 {
                result = -result;
            }
        }
        let (old_a, old_n) = (a as u64, n);
        n = old_a;
        a = old_n as i64;
        if a % 4 == 3 && n % 4 == 3 {
            result = -result;
        }
        a %= n as i64;
    }
    if n == 1 {
        result
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashtable::HashTable;

    #[test]
    fn bsgs_finds_known_discrete_log() {
        let p = 1_000_003u64;
        let ctx = ModArith::new(p);
        let base = 2u64;
        // order of 2 mod p (not computed precisely; just pick target = base^x).
        let x_true = 777u64;
        let base_res = ctx.to_residue(base);
        let target_res = ctx.pow(base_res, x_true);
        let base_inv = ctx.inverse(base_res).unwrap();

        let plan = StepPlan::choose(2000, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 20);
        let mut table = HashTable::for_elements(plan.m);
        let hits = bsgs_search(&ctx, base_inv, target_res, 1, plan, &mut table);

        // recovery is `x = m*i - j`, not `i*m + j` (the table holds
        // `base_inv^(q*j)`, so matching `gamma_i = target * base_inv^(q*m*i)`
        // against it solves `target = base^(q*(m*i - j))`).
        let found = hits
            .iter()
            .map(|h| plan.m as i64 * h.i as i64 - h.j as i64)
            .any(|x| x == x_true as i64);
        assert!(found, "expected to find x={}, got hits {:?}", x_true, hits);
    }

    #[test]
    fn choose_steps_respects_hash_cap() {
        let plan = StepPlan::choose(1_000_000_000, 1, 1.0, 1 << 15);
        assert!(plan.m as u32 <= (1 << 15));
    }

    #[test]
    fn jacobi_matches_known_values() {
        assert_eq!(jacobi_symbol(1, 3), 1);
        assert_eq!(jacobi_symbol(2, 3), -1);
        assert_eq!(jacobi_symbol(0, 5), 0);
    }
}
