// Path: crates/test_utils/src/randomness/mod.rs
//! Seeded randomness for tests that sweep many generated member sets.

use mnq_types::Hash256;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// A seeded generator. The same seed always yields the same sequence.
pub struct TestRng {
    rng: StdRng,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self {
            rng: StdRng::from_seed(seed_bytes),
        }
    }

    /// A value in `low..=high`.
    pub fn between(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..=high.max(low))
    }

    pub fn hash(&mut self) -> Hash256 {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        Hash256(bytes)
    }

    /// `count` distinct random hashes, in generation order.
    pub fn distinct_hashes(&mut self, count: usize) -> Vec<Hash256> {
        let mut out: Vec<Hash256> = Vec::with_capacity(count);
        while out.len() < count {
            let h = self.hash();
            if !out.contains(&h) {
                out.push(h);
            }
        }
        out
    }
}

impl Default for TestRng {
    fn default() -> Self {
        Self::new(12345)
    }
}
