//! Context fingerprints.
//!
//! A fingerprint binds one profile to one key pair. It is written into every
//! key store artifact and every ciphertext envelope so that material from
//! different installations is never mixed silently.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::profiles::Profile;

pub const FINGERPRINT_BYTES: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextFingerprint([u8; FINGERPRINT_BYTES]);

impl ContextFingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    /// First eight bytes as lowercase hex, for logs.
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextFingerprint({})", self.short())
    }
}

impl fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Identifies a key pair by its serialized public half.
pub fn key_pair_id(public_key_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(b"fhe-vault::key-pair");
    hasher.update(public_key_bytes);
    *hasher.finalize().as_bytes()
}

pub fn compute_fingerprint(profile: &Profile, public_key_bytes: &[u8]) -> ContextFingerprint {
    let mut hasher = Hasher::new();
    hasher.update(b"fhe-vault::fingerprint");
    hasher.update(&profile.digest());
    hasher.update(&key_pair_id(public_key_bytes));
    ContextFingerprint(*hasher.finalize().as_bytes())
}
