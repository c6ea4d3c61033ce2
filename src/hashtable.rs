//! # HashTable — Baby-Step Residue → Index Map
//!
//! Open-addressed hash table mapping a 64-bit Montgomery residue to a small
//! integer index `j`, used by `BabyGiantEngine` to invert the baby-step
//! table during a giant-step scan. Three tiers share identical semantics but
//! differ in slot width (8/16/32-bit), chosen by the caller from the maximum
//! element count the family ever needs (spec §4.2, grounded in the source's
//! `TinyHashTable`/`SmallHashTable`/`BigHashTable`, collapsed per spec §9's
//! design note into "an enum of hash-table size tiers" instead of a
//! virtual-dispatch class hierarchy).
//!
//! `BJ[empty]` is always `u64::MAX` (Invariant H2) — no true residue is ever
//! that large, since residues are `< p < 2^62`.

pub const NOT_FOUND: u32 = u32::MAX;

const MIN_ELTS: u32 = 8;
// All three tiers use the same max load factor (source: HASH_MAX_DENSITY,
// 0.60 uniformly across Tiny/Small/BigHashTable).
const MAX_DENSITY_SMALL: f64 = 0.60;

fn sized_hsize(elements: u32, min_shift: u32, density: f64) -> u32 {
    let mut hsize: u32 = 1 << min_shift;
    while (hsize as f64) < (elements as f64) / density {
        hsize *= 2;
    }
    hsize
}

/// Generates one tier: `$name` struct, `$slot` storage type, `$mask1` the
/// chain-flag bit, `$max_elts` the tier's element ceiling, `$min_shift`/
/// `$density` the sizing parameters. Mirrors the three near-identical C++
/// classes in the source, whose only difference is the width of `htable`,
/// `olist`, and the reserved high bit of a slot.
macro_rules! hash_tier {
    ($name:ident, $slot:ty, $mask1:expr, $max_elts:expr, $min_shift:expr, $density:expr) => {
        pub struct $name {
            htable: Vec<$slot>,
            olist: Vec<$slot>,
            bj: Vec<u64>,
            hsize_minus1: u32,
            empty_slot: $slot,
            inserts: u64,
            conflicts: u64,
        }

        impl $name {
            pub const MAX_ELTS: u32 = $max_elts;

            pub fn new(elements: u32) -> Self {
                assert!(
                    elements <= Self::MAX_ELTS,
                    "{} elements exceeds tier max {}",
                    elements,
                    Self::MAX_ELTS
                );
                let elements = elements.max(MIN_ELTS);
                let hsize = sized_hsize(elements, $min_shift, $density);
                let empty_slot = elements as $slot;
                let mut bj = vec![0u64; elements as usize + 1];
                bj[elements as usize] = u64::MAX;
                let mut t = $name {
                    htable: vec![empty_slot; hsize as usize],
                    olist: vec![0; elements as usize],
                    bj,
                    hsize_minus1: hsize - 1,
                    empty_slot,
                    inserts: 0,
                    conflicts: 0,
                };
                t.clear();
                t
            }

            /// Fill the slot array with the sentinel; restore `BJ[empty]`.
            pub fn clear(&mut self) {
                for slot in self.htable.iter_mut() {
                    *slot = self.empty_slot;
                }
                *self.bj.last_mut().unwrap() = u64::MAX;
            }

            #[inline]
            pub fn get(&self, j: u32) -> u64 {
                self.bj[j as usize]
            }

            /// Store `BJ[j] = r`; chain through `olist` on collision.
            pub fn insert(&mut self, r: u64, j: u32) {
                self.inserts += 1;
                self.bj[j as usize] = r;
                let slot = (r as u32 & self.hsize_minus1) as usize;
                if self.htable[slot] == self.empty_slot {
                    self.htable[slot] = j as $slot;
                    return;
                }
                self.olist[j as usize] = self.htable[slot];
                self.htable[slot] = (j as $slot) | $mask1;
                self.conflicts += 1;
            }

            /// Probe the chain for residue `r`; `NOT_FOUND` if absent.
            pub fn lookup(&self, r: u64) -> u32 {
                let mask2 = $mask1 - 1;
                let slot = (r as u32 & self.hsize_minus1) as usize;
                let mut elt = self.htable[slot];
                let mut elt_low = elt & (mask2 as $slot);
                if self.bj[elt_low as usize] == r {
                    return elt_low as u32;
                }
                while elt != elt_low {
                    elt = self.olist[(elt & (mask2 as $slot)) as usize];
                    elt_low = elt & (mask2 as $slot);
                    if self.bj[elt_low as usize] == r {
                        return elt_low as u32;
                    }
                }
                NOT_FOUND
            }

            pub fn inserts(&self) -> u64 {
                self.inserts
            }

            pub fn conflicts(&self) -> u64 {
                self.conflicts
            }
        }
    };
}

hash_tier!(TinyHashTable, u8, 1u8 << 7, (1u32 << 7) - 2, 4, MAX_DENSITY_SMALL);
hash_tier!(SmallHashTable, u16, 1u16 << 15, (1u32 << 15) - 2, 8, MAX_DENSITY_SMALL);
hash_tier!(BigHashTable, u32, 1u32 << 24, (1u32 << 24) - 2, 11, MAX_DENSITY_SMALL);

/// Picks the narrowest tier that can hold `elements`, replacing the source's
/// virtual-dispatch `HashTable` hierarchy with an enum (spec §9).
pub enum HashTable {
    Tiny(TinyHashTable),
    Small(SmallHashTable),
    Big(BigHashTable),
}

impl HashTable {
    pub fn for_elements(elements: u32) -> Self {
        if elements <= TinyHashTable::MAX_ELTS {
            HashTable::Tiny(TinyHashTable::new(elements))
        } else if elements <= SmallHashTable::MAX_ELTS {
            HashTable::Small(SmallHashTable::new(elements))
        } else {
            HashTable::Big(BigHashTable::new(elements))
        }
    }

    pub fn clear(&mut self) {
        match self {
            HashTable::Tiny(t) => t.clear(),
            HashTable::Small(t) => t.clear(),
            HashTable::Big(t) => t.clear(),
        }
    }

    pub fn insert(&mut self, r: u64, j: u32) {
        match self {
            HashTable::Tiny(t) => t.insert(r, j),
            HashTable::Small(t) => t.insert(r, j),
            HashTable::Big(t) => t.insert(r, j),
        }
    }

    pub fn lookup(&self, r: u64) -> u32 {
        match self {
            HashTable::Tiny(t) => t.lookup(r),
            HashTable::Small(t) => t.lookup(r),
            HashTable::Big(t) => t.lookup(r),
        }
    }

    pub fn get(&self, j: u32) -> u64 {
        match self {
            HashTable::Tiny(t) => t.get(j),
            HashTable::Small(t) => t.get(j),
            HashTable::Big(t) => t.get(j),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_insert_lookup_roundtrip() {
        let mut t = TinyHashTable::new(20);
        let residues: Vec<u64> = (0..20).map(|i| 100_003 * (i as u64 + 1)).collect();
        for (j, &r) in residues.iter().enumerate() {
            t.insert(r, j as u32);
        }
        for (j, &r) in residues.iter().enumerate() {
            assert_eq!(t.lookup(r), j as u32);
        }
        assert_eq!(t.lookup(999_999_999), NOT_FOUND);
    }

    #[test]
    fn enum_picks_tier_by_size() {
        assert!(matches!(HashTable::for_elements(10), HashTable::Tiny(_)));
        assert!(matches!(HashTable::for_elements(1000), HashTable::Small(_)));
        assert!(matches!(
            HashTable::for_elements(1 << 20),
            HashTable::Big(_)
        ));
    }

    #[test]
    fn sentinel_never_matches_real_residue() {
        let t = SmallHashTable::new(50);
        // empty_slot's BJ entry is u64::MAX; no residue (always < p < 2^62) matches.
        assert_eq!(t.get(t.empty_slot as u32), u64::MAX);
    }

    #[test]
    fn collisions_chain_correctly() {
        // Force all 64 elements into the same bucket: craft hsize=16 (min shift
        // for Tiny is 4 -> hsize 16 at 64 elts / 0.60 density rounds to 128,
        // so use values all congruent mod 128 to force one slot).
        let mut t = TinyHashTable::new(30);
        let hsize = 1u32 << 4;
        let mut hs = hsize;
        while (hs as f64) < 30.0 / MAX_DENSITY_SMALL {
            hs *= 2;
        }
        let residues: Vec<u64> = (0..30).map(|i| (i as u64) * hs as u64 + 5).collect();
        for (j, &r) in residues.iter().enumerate() {
            t.insert(r, j as u32);
        }
        for (j, &r) in residues.iter().enumerate() {
            assert_eq!(t.lookup(r), j as u32);
        }
        assert!(t.conflicts() > 0);
    }
}
