//! Host-value adapters and CKKS slot packing.
//!
//! Slot `k` of a packed plaintext is the evaluation of the message polynomial
//! at `ζ^{2k+1}`, `ζ = e^{iπ/N}`. Writing each real value into slot `k` and
//! its conjugate slot `N-1-k` keeps the polynomial real, so the usable
//! capacity is `N/2` values per plaintext.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Widens host samples to the engine's precision.
pub fn encode(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&v| f64::from(v)).collect()
}

/// Narrows engine output back to host samples.
pub fn decode(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Canonical-embedding encoder for one ring dimension and scale.
#[derive(Clone)]
pub struct SlotEncoder {
    degree: usize,
    scale: f64,
    /// ζ^j for j in 0..N.
    twist: Vec<Complex<f64>>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl SlotEncoder {
    pub fn new(degree: usize, scale: f64) -> Self {
        let mut planner = FftPlanner::new();
        let twist = (0..degree)
            .map(|j| Complex::from_polar(1.0, PI * j as f64 / degree as f64))
            .collect();
        Self {
            degree,
            scale,
            twist,
            forward: planner.plan_fft_forward(degree),
            inverse: planner.plan_fft_inverse(degree),
        }
    }

    pub fn capacity(&self) -> usize {
        self.degree / 2
    }

    /// Scaled integer coefficients of the polynomial whose slots hold
    /// `values`. Unused slots are zero. Callers check capacity.
    pub fn encode_slots(&self, values: &[f64]) -> Vec<i64> {
        debug_assert!(values.len() <= self.capacity());
        let n = self.degree;
        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        for (k, &value) in values.iter().enumerate() {
            buffer[k] = Complex::new(value, 0.0);
            buffer[n - 1 - k] = Complex::new(value, 0.0);
        }
        self.forward.process(&mut buffer);

        let norm = self.scale / n as f64;
        buffer
            .iter()
            .zip(&self.twist)
            .map(|(a, w)| ((*a * w.conj()).re * norm).round() as i64)
            .collect()
    }

    /// Reads the first `len` slots from centered coefficients.
    pub fn decode_slots(&self, coeffs: &[i64], len: usize) -> Vec<f64> {
        debug_assert_eq!(coeffs.len(), self.degree);
        let mut buffer: Vec<Complex<f64>> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, w)| *w * (c as f64 / self.scale))
            .collect();
        self.inverse.process(&mut buffer);
        buffer.iter().take(len).map(|z| z.re).collect()
    }
}

impl fmt::Debug for SlotEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotEncoder")
            .field("degree", &self.degree)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}
