//! Deterministic random number generation.
//!
//! RULE: Nothing in the generator may call any platform RNG.
//! All randomness for one run flows through a single GenRng seeded
//! from the request seed, and is drawn in a fixed order:
//!   1. user sampling
//!   2. events   (day-major, then user)
//!   3. invoices (subscription-major, then month)
//!   4. tickets  (day-major, then user)
//!
//! Reordering any of these changes every row generated after it.
//! The generator is never reseeded mid-run.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The single seeded stream threaded through one generation run.
pub struct GenRng {
    inner: Pcg64Mcg,
}

impl GenRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an integer in [lo, hi], both ends inclusive.
    pub fn randint(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo <= hi, "randint bounds inverted: {lo} > {hi}");
        let span = (hi - lo) as u64 + 1;
        lo + self.next_u64_below(span) as i64
    }

    /// Pick one element uniformly.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "choice from empty slice");
        &items[self.next_u64_below(items.len() as u64) as usize]
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Draw `k` distinct indices from `0..len` without replacement.
    ///
    /// Partial Fisher–Yates. The result is sorted ascending so sampled
    /// items keep their input order. `k >= len` returns every index and
    /// consumes no draws.
    pub fn sample_indices(&mut self, len: usize, k: usize) -> Vec<usize> {
        if k >= len {
            return (0..len).collect();
        }
        let mut pool: Vec<usize> = (0..len).collect();
        for i in 0..k {
            let j = i + self.next_u64_below((len - i) as u64) as usize;
            pool.swap(i, j);
        }
        let mut picked = pool[..k].to_vec();
        picked.sort_unstable();
        picked
    }
}
