//! Injected randomness source.
//!
//! Every probabilistic choice in the crate — category shuffling, weighted
//! template selection, interleave jitter — goes through this one trait
//! instead of calling into a global RNG directly, so a seeded
//! implementation makes the whole composition pipeline reproducible.

/// Source of randomness threaded through the composer and registry.
/// Implementors need only produce uniform values in `[0, 1)`; every other
/// operation (`next_range`, `shuffle`) is derived from that.
pub trait RngSource {
    /// Next uniform value in `[0, 1)`.
    fn next_uniform_unit(&mut self) -> f64;

    /// Next integer uniformly distributed in `[0, n)`. Panics if `n == 0`.
    fn next_range(&mut self, n: usize) -> usize {
        assert!(n > 0, "next_range requires a non-empty range");
        let scaled = self.next_uniform_unit() * n as f64;
        (scaled as usize).min(n - 1)
    }

    /// Fisher–Yates shuffle in place.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }
}

/// Deterministic xorshift64* PRNG. The default seedable implementation;
/// identical seeds produce byte-for-byte identical sequences, which is what
/// reproducible test fixtures need from a composed session.
#[derive(Debug, Clone)]
pub struct Xorshift64Rng {
    state: u64,
}

impl Xorshift64Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E3779B97F4A7C15 } else { seed },
        }
    }

    /// Seed off the system clock. Only used by the CLI/web demonstration
    /// harness, never inside the pure core.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x2545F4914F6CDD1D);
        Self::new(nanos)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl RngSource for Xorshift64Rng {
    fn next_uniform_unit(&mut self) -> f64 {
        // Top 53 bits give a value exactly representable as f64 in [0, 1).
        let bits = self.next_u64() >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Xorshift64Rng::new(42);
        let mut b = Xorshift64Rng::new(42);
        for _ in 0..50 {
            assert_eq!(a.next_uniform_unit(), b.next_uniform_unit());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Xorshift64Rng::new(1);
        let mut b = Xorshift64Rng::new(2);
        let seq_a: Vec<f64> = (0..10).map(|_| a.next_uniform_unit()).collect();
        let seq_b: Vec<f64> = (0..10).map(|_| b.next_uniform_unit()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn uniform_unit_in_bounds() {
        let mut rng = Xorshift64Rng::new(7);
        for _ in 0..1000 {
            let v = rng.next_uniform_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn next_range_in_bounds() {
        let mut rng = Xorshift64Rng::new(99);
        for _ in 0..1000 {
            let v = rng.next_range(7);
            assert!(v < 7);
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Xorshift64Rng::new(5);
        let mut items: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_deterministic_given_seed() {
        let mut items_a: Vec<u32> = (0..20).collect();
        let mut items_b: Vec<u32> = (0..20).collect();
        Xorshift64Rng::new(123).shuffle(&mut items_a);
        Xorshift64Rng::new(123).shuffle(&mut items_b);
        assert_eq!(items_a, items_b);
    }

    #[test]
    fn zero_seed_is_remapped() {
        let rng = Xorshift64Rng::new(0);
        assert_ne!(rng.state, 0);
    }
}
