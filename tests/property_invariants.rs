//! Quantified invariants (MM1-MM3, B1-B3, H1-H2) checked over generated
//! inputs rather than fixed examples.

use mtsieve_core::bitmap::{PackedBitmap, TermBitmap};
use mtsieve_core::hashtable::{HashTable, NOT_FOUND};
use mtsieve_core::montgomery::ModArith;
use proptest::prelude::*;

fn odd_prime_strategy() -> impl Strategy<Value = u64> {
    // A handful of primes spanning small, mid-sized and near-u32 magnitudes;
    // `prop_oneof` picks among them so every case run is a genuine prime.
    prop_oneof![
        Just(3u64),
        Just(5),
        Just(7),
        Just(1_000_003),
        Just(999_999_937),
        Just(999_999_999_999_999_989),
    ]
}

proptest! {
    /// MM1: every residue produced by `to_residue` satisfies `0 <= r < p`.
    #[test]
    fn mm1_residues_stay_in_range(p in odd_prime_strategy(), n in any::<u64>()) {
        let ctx = ModArith::new(p);
        let r = ctx.to_residue(n);
        prop_assert!(r < p);
    }

    /// MM2: `from_residue` and `to_residue` are mutual inverses.
    #[test]
    fn mm2_to_from_residue_round_trips(p in odd_prime_strategy(), n in any::<u64>()) {
        let ctx = ModArith::new(p);
        let r = ctx.to_residue(n);
        prop_assert_eq!(ctx.from_residue(r), n % p);
    }

    /// MM3: `mul` computes ordinary modular multiplication once both
    /// operands are converted out of Montgomery form.
    #[test]
    fn mm3_mul_matches_naive_modmul(p in odd_prime_strategy(), a in any::<u64>(), b in any::<u64>()) {
        let ctx = ModArith::new(p);
        let ra = ctx.to_residue(a);
        let rb = ctx.to_residue(b);
        let got = ctx.from_residue(ctx.mul(ra, rb));
        let want = ((a as u128 % p as u128) * (b as u128 % p as u128) % p as u128) as u64;
        prop_assert_eq!(got, want);
    }

    /// B1/B2: a bitmap starts fully set, and every `report_factor` on a
    /// distinct coordinate strictly decreases the live count by exactly one.
    #[test]
    fn b1_b2_report_factor_tracks_count_exactly(
        len in 1usize..500,
        coords in prop::collection::hash_set(0usize..500, 0..50),
    ) {
        let bitmap = PackedBitmap::new_all_set(len);
        prop_assert_eq!(bitmap.count(), len as u64);
        let mut cleared = 0u64;
        for &c in &coords {
            if c >= len {
                continue;
            }
            if bitmap.report_factor(c, 7, 1_000_000) {
                cleared += 1;
            }
        }
        prop_assert_eq!(bitmap.count(), len as u64 - cleared);
        prop_assert_eq!(bitmap.factor_count(), cleared);
    }

    /// B3: clearing an already-clear bit is a no-op (reports no transition,
    /// count is unaffected).
    #[test]
    fn b3_double_clear_is_idempotent(len in 1usize..200, coord in 0usize..200) {
        prop_assume!(coord < len);
        let bitmap = PackedBitmap::new_all_set(len);
        let first = bitmap.report_factor(coord, 7, 1_000_000);
        let second = bitmap.report_factor(coord, 7, 1_000_000);
        prop_assert!(first);
        prop_assert!(!second);
        prop_assert_eq!(bitmap.count(), len as u64 - 1);
    }

    /// H1/H2: a value inserted into the hash table is found by subsequent
    /// lookup, and an absent value is reported as not found.
    #[test]
    fn h1_h2_hashtable_insert_then_lookup(
        values in prop::collection::hash_set(1u64..1_000_000, 1..40),
    ) {
        let mut values: Vec<u64> = values.into_iter().collect();
        values.sort_unstable();
        let mut table = HashTable::for_elements(values.len() as u32);
        for (j, &v) in values.iter().enumerate() {
            table.insert(v, j as u32);
        }
        for (j, &v) in values.iter().enumerate() {
            prop_assert_eq!(table.lookup(v), j as u32);
        }
        prop_assert_eq!(table.lookup(u64::MAX - 1), NOT_FOUND);
    }
}
