//! # ModArith — Montgomery-Form Modular Arithmetic
//!
//! Every residue held by this module satisfies `0 <= r < p` (Invariant MM1).
//! `to_residue`/`from_residue` are mutual inverses (MM2); `mul` computes
//! `a*b*R^-1 mod p` for residues (MM3). `R = 2^64`.
//!
//! Grounded in the teacher's `sieve::MontgomeryCtx`, generalized to the full
//! add/sub/pow surface the sieve engine needs and extended with a 4-lane
//! vector form (`Vec4ModArith`) standing in for the source's x86 FPU/AVX
//! mulmod intrinsics (spec §9: "Abstract behind a `Vec4ModArith` trait;
//! provide a portable Montgomery implementation").

/// Montgomery-form modular arithmetic context for a single odd prime `p`,
/// `3 <= p < 2^62`.
#[derive(Clone, Copy, Debug)]
pub struct ModArith {
    p: u64,
    /// `q` such that `q*p == -1 mod 2^64`.
    q: u64,
    /// `R mod p`, the Montgomery form of 1.
    r_mod_p: u64,
    /// `R^2 mod p`, used to move values into Montgomery form.
    r2_mod_p: u64,
}

impl ModArith {
    /// Build a context for odd prime `p` in `[3, 2^62)`.
    ///
    /// # Panics
    /// Panics if `p` is even or out of range; callers (the `PrimeSource`)
    /// guarantee this never happens in practice (spec §4.1: "even p produces
    /// undefined results, which the upstream prime source guarantees cannot
    /// occur").
    pub fn new(p: u64) -> Self {
        debug_assert!(p & 1 == 1 && p >= 3 && p < (1u64 << 62));
        let q = Self::invert_mod_2_64(p);
        let r_mod_p = ((1u128 << 64) % p as u128) as u64;
        let r2_mod_p = ((r_mod_p as u128 * r_mod_p as u128) % p as u128) as u64;
        ModArith {
            p,
            q,
            r_mod_p,
            r2_mod_p,
        }
    }

    /// Hensel/Newton doubling: `q = -p^-1 mod 2^64`, seeded at 1 and doubling
    /// precision each iteration (spec §4.1: "seed 1, iterate
    /// `x <- x*(2 - p*x)` until fixpoint").
    fn invert_mod_2_64(p: u64) -> u64 {
        let mut x: u64 = 1;
        for _ in 0..6 {
            x = x.wrapping_mul(2u64.wrapping_sub(p.wrapping_mul(x)));
        }
        x.wrapping_neg()
    }

    #[inline]
    pub fn modulus(&self) -> u64 {
        self.p
    }

    /// Montgomery form of 1 (`R mod p`), per spec §4.1.
    #[inline]
    pub fn one(&self) -> u64 {
        self.r_mod_p
    }

    /// `to_residue(n) = n*R mod p`.
    #[inline]
    pub fn to_residue(&self, n: u64) -> u64 {
        self.mul(n % self.p, self.r2_mod_p)
    }

    /// `from_residue(r) = r*R^-1 mod p`.
    #[inline]
    pub fn from_residue(&self, r: u64) -> u64 {
        self.reduce(r as u128)
    }

    #[inline]
    fn reduce(&self, t: u128) -> u64 {
        let m = (t as u64).wrapping_mul(self.q);
        let u = t + (m as u128) * (self.p as u128);
        let hi = (u >> 64) as u64;
        if hi >= self.p {
            hi - self.p
        } else {
            hi
        }
    }

    /// `mul(a,b) = a*b*R^-1 mod p` for residues `a, b` (MM3).
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce((a as u128) * (b as u128))
    }

    #[inline]
    pub fn sqr(&self, a: u64) -> u64 {
        self.mul(a, a)
    }

    /// Branch-free conditional-subtract add: `(a+b) mod p` for residues.
    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let s = a.wrapping_add(b);
        // s can overflow by at most p-1 < 2^62, so a single conditional
        // subtraction suffices; the overflow itself never wraps u64.
        if s >= self.p || s < a {
            s.wrapping_sub(self.p)
        } else {
            s
        }
    }

    /// Branch-free conditional-add sub: `(a-b) mod p` for residues.
    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a.wrapping_sub(b).wrapping_add(self.p)
        }
    }

    /// Square-and-multiply from the low bit, per spec §4.1.
    pub fn pow(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = self.r_mod_p;
        let mut b = base;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, b);
            }
            exp >>= 1;
            if exp > 0 {
                b = self.sqr(b);
            }
        }
        result
    }

    /// Multiplicative inverse of a nonzero residue via Fermat: `a^(p-2)`.
    pub fn inverse(&self, a: u64) -> Option<u64> {
        if a == 0 {
            return None;
        }
        Some(self.pow(a, self.p - 2))
    }
}

/// 4-lane vectorised Montgomery arithmetic over four (generally distinct)
/// odd primes, standing in for the source's hand-written AVX mulmod kernels.
/// Each lane obeys MM1-MM3 independently; there is no cross-lane dependency.
#[derive(Clone, Copy, Debug)]
pub struct Vec4ModArith {
    lanes: [ModArith; 4],
}

impl Vec4ModArith {
    pub fn new(primes: [u64; 4]) -> Self {
        Vec4ModArith {
            lanes: [
                ModArith::new(primes[0]),
                ModArith::new(primes[1]),
                ModArith::new(primes[2]),
                ModArith::new(primes[3]),
            ],
        }
    }

    #[inline]
    pub fn to_residue(&self, n: [u64; 4]) -> [u64; 4] {
        std::array::from_fn(|i| self.lanes[i].to_residue(n[i]))
    }

    #[inline]
    pub fn from_residue(&self, r: [u64; 4]) -> [u64; 4] {
        std::array::from_fn(|i| self.lanes[i].from_residue(r[i]))
    }

    #[inline]
    pub fn mul(&self, a: [u64; 4], b: [u64; 4]) -> [u64; 4] {
        std::array::from_fn(|i| self.lanes[i].mul(a[i], b[i]))
    }

    #[inline]
    pub fn pow(&self, base: [u64; 4], exp: [u64; 4]) -> [u64; 4] {
        std::array::from_fn(|i| self.lanes[i].pow(base[i], exp[i]))
    }

    pub fn lane(&self, i: usize) -> &ModArith {
        &self.lanes[i]
    }

    /// Fast pre-check before the four scalar comparisons that report
    /// factors (spec §4.1): does any lane's residue equal either target?
    #[inline]
    pub fn at_least_one_equal(&self, a: [u64; 4], b_plus: [u64; 4], b_minus: [u64; 4]) -> bool {
        (0..4).any(|i| a[i] == b_plus[i] || a[i] == b_minus[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_odd_primes() -> Vec<u64> {
        vec![3, 5, 7, 11, 13, 101, 1_000_003, 999_999_999_999_999_989]
    }

    #[test]
    fn round_trip_to_from_residue() {
        for &p in &small_odd_primes() {
            let ctx = ModArith::new(p);
            for n in [0u64, 1, 2, p - 1, p / 2] {
                let r = ctx.to_residue(n);
                assert!(r < p, "MM1 violated: {} >= {}", r, p);
                assert_eq!(ctx.from_residue(r), n % p);
            }
        }
    }

    #[test]
    fn mul_matches_plain_modmul() {
        for &p in &small_odd_primes() {
            let ctx = ModArith::new(p);
            for (a, b) in [(3u64, 5u64), (p - 1, 2), (p / 3, p / 7)] {
                let ra = ctx.to_residue(a);
                let rb = ctx.to_residue(b);
                let got = ctx.from_residue(ctx.mul(ra, rb));
                let want = ((a as u128 * b as u128) % p as u128) as u64;
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn pow_matches_plain_modpow() {
        for &p in &small_odd_primes() {
            let ctx = ModArith::new(p);
            for (base, exp) in [(2u64, 10u64), (p - 2, 7), (3, p - 1)] {
                let rbase = ctx.to_residue(base % p);
                let got = ctx.from_residue(ctx.pow(rbase, exp));
                let mut want: u128 = 1;
                let mut b = (base % p) as u128;
                let mut e = exp;
                while e > 0 {
                    if e & 1 == 1 {
                        want = (want * b) % p as u128;
                    }
                    b = (b * b) % p as u128;
                    e >>= 1;
                }
                assert_eq!(got, want as u64);
            }
        }
    }

    #[test]
    fn inverse_round_trips() {
        for &p in &small_odd_primes() {
            let ctx = ModArith::new(p);
            for a in [1u64, 2, p - 1] {
                if a % p == 0 {
                    continue;
                }
                let ra = ctx.to_residue(a);
                let inv = ctx.inverse(ra).unwrap();
                let one = ctx.mul(ra, inv);
                assert_eq!(ctx.from_residue(one), 1);
            }
        }
    }

    #[test]
    fn add_sub_are_inverses() {
        let ctx = ModArith::new(1_000_003);
        let a = ctx.to_residue(12345);
        let b = ctx.to_residue(67890);
        assert_eq!(ctx.sub(ctx.add(a, b), b), a);
    }

    #[test]
    fn vec4_matches_scalar_per_lane() {
        let primes = [3u64, 5, 1_000_003, 999_999_999_999_999_989];
        let v = Vec4ModArith::new(primes);
        let ns = [2u64, 4, 999_999, 123_456_789];
        let rs = v.to_residue(ns);
        for i in 0..4 {
            let scalar = ModArith::new(primes[i]);
            assert_eq!(rs[i], scalar.to_residue(ns[i]));
        }
    }
}
