//! Arithmetic in `Z_q[x]/(x^n + 1)` for a single NTT-friendly prime.
//!
//! Ring elements are kept in the negacyclic NTT domain so products are
//! element-wise. Coefficient form only appears at the encode/decode edges.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Parameters describing the polynomial ring `Z_q[x]/(x^n + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingParams {
    pub degree: usize,
    pub modulus: u64,
}

impl RingParams {
    pub const fn new(degree: usize, modulus: u64) -> Self {
        Self { degree, modulus }
    }

    pub fn reduce_signed(&self, value: i64) -> u64 {
        value.rem_euclid(self.modulus as i64) as u64
    }

    /// Maps `[0, q)` onto `(-q/2, q/2]`.
    pub fn center(&self, value: u64) -> i64 {
        if value > self.modulus / 2 {
            -((self.modulus - value) as i64)
        } else {
            value as i64
        }
    }
}

/// Polynomial in the configured ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct RingElement {
    coeffs: Vec<u64>,
}

impl RingElement {
    pub fn from_coeffs(coeffs: Vec<u64>) -> Self {
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[u64] {
        &self.coeffs
    }

    pub fn coeffs_mut(&mut self) -> &mut [u64] {
        &mut self.coeffs
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// True when the element has `degree` coefficients, each below `modulus`.
    pub fn is_canonical(&self, params: RingParams) -> bool {
        self.coeffs.len() == params.degree && self.coeffs.iter().all(|&c| c < params.modulus)
    }
}

/// Pre-computed negacyclic NTT tables plus element-wise ring operations.
#[derive(Clone)]
pub struct NttRing {
    params: RingParams,
    /// ψ^{bitrev(i)}, ψ a primitive 2n-th root of unity.
    psi_rev: Vec<u64>,
    /// ψ^{-bitrev(i)}.
    psi_inv_rev: Vec<u64>,
    n_inv: u64,
}

impl NttRing {
    /// Returns `None` when `degree` is not a power of two or `modulus` is not
    /// a prime congruent to 1 mod 2n.
    pub fn new(params: RingParams) -> Option<Self> {
        let n = params.degree;
        let q = params.modulus;
        if n < 2 || !n.is_power_of_two() || q >= 1 << 62 || !is_prime(q) {
            return None;
        }
        let psi = find_primitive_root(n, q)?;
        let psi_inv = mod_inv(psi, q);
        let log_n = n.trailing_zeros();

        let mut psi_rev = vec![0u64; n];
        let mut psi_inv_rev = vec![0u64; n];
        let mut power = 1u64;
        let mut inv_power = 1u64;
        for i in 0..n {
            let rev = bit_reverse(i, log_n);
            psi_rev[rev] = power;
            psi_inv_rev[rev] = inv_power;
            power = mod_mul(power, psi, q);
            inv_power = mod_mul(inv_power, psi_inv, q);
        }

        Some(Self {
            params,
            psi_rev,
            psi_inv_rev,
            n_inv: mod_inv(n as u64, q),
        })
    }

    pub fn params(&self) -> RingParams {
        self.params
    }

    pub fn degree(&self) -> usize {
        self.params.degree
    }

    /// In-place forward transform (Cooley-Tukey, merged ψ twist).
    pub fn forward(&self, a: &mut [u64]) {
        let n = self.params.degree;
        let q = self.params.modulus;
        debug_assert_eq!(a.len(), n);

        let mut t = n;
        let mut m = 1;
        while m < n {
            t >>= 1;
            for i in 0..m {
                let w = self.psi_rev[m + i];
                let j1 = 2 * i * t;
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = mod_mul(a[j + t], w, q);
                    a[j] = mod_add(u, v, q);
                    a[j + t] = mod_sub(u, v, q);
                }
            }
            m <<= 1;
        }
    }

    /// In-place inverse transform (Gentleman-Sande), including the 1/n factor.
    pub fn inverse(&self, a: &mut [u64]) {
        let n = self.params.degree;
        let q = self.params.modulus;
        debug_assert_eq!(a.len(), n);

        let mut t = 1;
        let mut m = n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let w = self.psi_inv_rev[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = mod_add(u, v, q);
                    a[j + t] = mod_mul(mod_sub(u, v, q), w, q);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }

        for coeff in a.iter_mut() {
            *coeff = mod_mul(*coeff, self.n_inv, q);
        }
    }

    /// Lifts signed coefficients into the ring and transforms them.
    pub fn from_signed(&self, coeffs: &[i64]) -> RingElement {
        let mut values: Vec<u64> = coeffs
            .iter()
            .map(|&c| self.params.reduce_signed(c))
            .collect();
        self.forward(&mut values);
        RingElement::from_coeffs(values)
    }

    /// Inverse-transforms and returns centered signed coefficients.
    pub fn to_signed(&self, element: &RingElement) -> Vec<i64> {
        let mut values = element.coeffs().to_vec();
        self.inverse(&mut values);
        values.iter().map(|&c| self.params.center(c)).collect()
    }

    pub fn add(&self, a: &RingElement, b: &RingElement) -> RingElement {
        let q = self.params.modulus;
        self.zip_with(a, b, |x, y| mod_add(x, y, q))
    }

    /// Element-wise product; a negacyclic polynomial product in NTT form.
    pub fn mul(&self, a: &RingElement, b: &RingElement) -> RingElement {
        let q = self.params.modulus;
        self.zip_with(a, b, |x, y| mod_mul(x, y, q))
    }

    pub fn neg(&self, a: &RingElement) -> RingElement {
        let q = self.params.modulus;
        RingElement::from_coeffs(a.coeffs().iter().map(|&x| mod_sub(0, x, q)).collect())
    }

    fn zip_with(
        &self,
        a: &RingElement,
        b: &RingElement,
        op: impl Fn(u64, u64) -> u64,
    ) -> RingElement {
        assert_eq!(a.len(), b.len(), "ring elements of different degree");
        RingElement::from_coeffs(
            a.coeffs()
                .iter()
                .zip(b.coeffs())
                .map(|(&x, &y)| op(x, y))
                .collect(),
        )
    }
}

impl fmt::Debug for NttRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NttRing")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[inline(always)]
pub fn mod_add(a: u64, b: u64, q: u64) -> u64 {
    let sum = a + b;
    if sum >= q { sum - q } else { sum }
}

#[inline(always)]
pub fn mod_sub(a: u64, b: u64, q: u64) -> u64 {
    if a >= b { a - b } else { q - b + a }
}

#[inline(always)]
pub fn mod_mul(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

pub fn mod_pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
    let mut result = 1u64 % q;
    base %= q;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, q);
        }
        exp >>= 1;
        base = mod_mul(base, base, q);
    }
    result
}

/// Inverse via Fermat; `q` must be prime and `a` non-zero mod `q`.
pub fn mod_inv(a: u64, q: u64) -> u64 {
    mod_pow(a, q - 2, q)
}

/// Deterministic Miller-Rabin for all `u64`.
pub fn is_prime(n: u64) -> bool {
    const BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &BASES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for &a in &BASES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mod_mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Smallest-generator primitive 2n-th root of unity mod `q`.
pub fn find_primitive_root(n: usize, q: u64) -> Option<u64> {
    let two_n = 2 * n as u64;
    if q % two_n != 1 {
        return None;
    }
    let exponent = (q - 1) / two_n;
    (2..q.min(1 << 20)).find_map(|g| {
        let psi = mod_pow(g, exponent, q);
        (mod_pow(psi, n as u64, q) == q - 1).then_some(psi)
    })
}

pub fn bit_reverse(mut x: usize, bits: u32) -> usize {
    let mut result = 0usize;
    for _ in 0..bits {
        result = (result << 1) | (x & 1);
        x >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_negacyclic(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = mod_mul(a[i], b[j], q);
                if i + j < n {
                    out[i + j] = mod_add(out[i + j], prod, q);
                } else {
                    out[i + j - n] = mod_sub(out[i + j - n], prod, q);
                }
            }
        }
        out
    }

    #[test]
    fn modular_helpers() {
        let q = 17;
        assert_eq!(mod_add(10, 10, q), 3);
        assert_eq!(mod_sub(3, 10, q), 10);
        assert_eq!(mod_mul(5, 4, q), 3);
        assert_eq!(mod_pow(3, 16, q), 1);
        for a in 1..q {
            assert_eq!(mod_mul(a, mod_inv(a, q), q), 1);
        }
    }

    #[test]
    fn primality() {
        assert!(is_prime(2));
        assert!(is_prime(97));
        assert!(!is_prime(1));
        assert!(!is_prime(561));
        assert!(is_prime(1_125_899_906_826_241));
        assert!(!is_prime(1_125_899_906_826_243));
    }

    #[test]
    fn bit_reversal() {
        assert_eq!(bit_reverse(0b0001, 4), 0b1000);
        assert_eq!(bit_reverse(0b0110, 4), 0b0110);
        assert_eq!(bit_reverse(0b1010, 4), 0b0101);
    }

    #[test]
    fn primitive_root_has_order_two_n() {
        let q = 1_125_899_906_826_241;
        let psi = find_primitive_root(2048, q).unwrap();
        assert_eq!(mod_pow(psi, 4096, q), 1);
        assert_eq!(mod_pow(psi, 2048, q), q - 1);
        assert!(find_primitive_root(2048, 97).is_none());
    }

    #[test]
    fn rejects_unfriendly_params() {
        assert!(NttRing::new(RingParams::new(12, 97)).is_none());
        assert!(NttRing::new(RingParams::new(16, 91)).is_none());
        assert!(NttRing::new(RingParams::new(64, 97)).is_none());
    }

    #[test]
    fn ntt_roundtrip() {
        let ring = NttRing::new(RingParams::new(16, 97)).unwrap();
        let original: Vec<u64> = (0..16).collect();
        let mut a = original.clone();
        ring.forward(&mut a);
        assert_ne!(a, original);
        ring.inverse(&mut a);
        assert_eq!(a, original);
    }

    #[test]
    fn pointwise_product_is_negacyclic_convolution() {
        let q = 1_125_899_906_826_241;
        let ring = NttRing::new(RingParams::new(32, q)).unwrap();
        let a: Vec<u64> = (0..32).map(|i| (i * 7919 + 3) % q).collect();
        let b: Vec<u64> = (0..32).map(|i| q - 1 - i * 104_729).collect();
        let expected = naive_negacyclic(&a, &b, q);

        let mut a_ntt = a.clone();
        let mut b_ntt = b.clone();
        ring.forward(&mut a_ntt);
        ring.forward(&mut b_ntt);
        let product = ring.mul(
            &RingElement::from_coeffs(a_ntt),
            &RingElement::from_coeffs(b_ntt),
        );
        let mut c = product.coeffs().to_vec();
        ring.inverse(&mut c);
        assert_eq!(c, expected);
    }

    #[test]
    fn signed_lift_roundtrip() {
        let ring = NttRing::new(RingParams::new(16, 97)).unwrap();
        let coeffs: Vec<i64> = (0..16).map(|i| i - 8).collect();
        let element = ring.from_signed(&coeffs);
        assert_eq!(ring.to_signed(&element), coeffs);
    }

    #[test]
    fn canonical_check() {
        let params = RingParams::new(4, 97);
        assert!(RingElement::from_coeffs(vec![0, 1, 2, 96]).is_canonical(params));
        assert!(!RingElement::from_coeffs(vec![0, 1, 2, 97]).is_canonical(params));
        assert!(!RingElement::from_coeffs(vec![0, 1, 2]).is_canonical(params));
    }
}
