//! Randomness for key generation and encryption noise.
//!
//! Production paths draw from `OsRng`. Tests and benches derive a
//! `ChaCha20Rng` from a BLAKE3 label so runs are reproducible.

use blake3::Hasher;
use rand::Rng;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};

pub type SecureRng = OsRng;

pub fn secure_rng() -> SecureRng {
    OsRng
}

/// Deterministic RNG keyed by `seed` and a domain `label`.
pub fn derive_seeded_rng(seed: &[u8], label: &[u8]) -> ChaCha20Rng {
    let mut hasher = Hasher::new();
    hasher.update(b"fhe-vault::rng");
    hasher.update(seed);
    hasher.update(label);
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

/// Coefficients uniform over {-1, 0, 1}.
pub fn sample_ternary<R: CryptoRng + RngCore>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.gen_range(-1i64..=1)).collect()
}

/// Coefficients uniform over `[0, q)`.
pub fn sample_uniform<R: CryptoRng + RngCore>(rng: &mut R, n: usize, q: u64) -> Vec<u64> {
    (0..n).map(|_| rng.gen_range(0..q)).collect()
}

/// Rounded Gaussian error sampler.
#[derive(Clone, Copy, Debug)]
pub struct ErrorSampler {
    normal: Normal<f64>,
}

impl ErrorSampler {
    /// `None` when `std_dev` is negative or not finite.
    pub fn new(std_dev: f64) -> Option<Self> {
        if !std_dev.is_finite() {
            return None;
        }
        Normal::new(0.0, std_dev).ok().map(|normal| Self { normal })
    }

    pub fn sample<R: CryptoRng + RngCore>(&self, rng: &mut R, n: usize) -> Vec<i64> {
        (0..n)
            .map(|_| self.normal.sample(rng).round() as i64)
            .collect()
    }
}
