//! Fixed scheme parameter profiles.
//!
//! A profile is the complete, versioned description of a CKKS configuration.
//! Contexts are rebuilt from the compiled profile on load, so a profile is
//! never edited in place: new parameters get a new [`ProfileId`].

use blake3::Hasher;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub u16);

/// Target security of the ring dimension / modulus pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    Classic128,
    Quantum128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySwitchTechnique {
    Bv,
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingTechnique {
    FixedManual,
    FlexibleAuto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretKeyDistribution {
    UniformTernary,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: &'static str,
    pub version: u16,
    pub security: SecurityLevel,
    /// Ring dimension N. Packing capacity is N/2 real slots.
    pub ring_dim: usize,
    /// NTT-friendly prime q ≡ 1 (mod 2N).
    pub modulus: u64,
    pub first_mod_bits: u32,
    /// log2 of the encoding scale Δ.
    pub scaling_mod_bits: u32,
    pub multiplicative_depth: u32,
    pub desired_precision: u32,
    pub key_switch: KeySwitchTechnique,
    pub scaling: ScalingTechnique,
    pub secret_key_dist: SecretKeyDistribution,
    pub error_std_dev: f64,
}

impl Profile {
    pub fn slot_capacity(&self) -> usize {
        self.ring_dim / 2
    }

    pub fn log_n(&self) -> u32 {
        self.ring_dim.trailing_zeros()
    }

    pub fn scale(&self) -> f64 {
        (1u64 << self.scaling_mod_bits) as f64
    }

    /// Number of RNS limbs implied by the depth (one per level).
    pub fn num_limbs(&self) -> usize {
        self.multiplicative_depth as usize + 1
    }

    /// BLAKE3 digest over every field that affects the ciphertext space.
    ///
    /// Two profiles with equal digests produce mutually compatible contexts.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.update(b"fhe-vault::profile");
        hasher.update(&self.id.0.to_le_bytes());
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&[security_code(self.security)]);
        hasher.update(&(self.ring_dim as u64).to_le_bytes());
        hasher.update(&self.modulus.to_le_bytes());
        hasher.update(&self.first_mod_bits.to_le_bytes());
        hasher.update(&self.scaling_mod_bits.to_le_bytes());
        hasher.update(&self.multiplicative_depth.to_le_bytes());
        hasher.update(&self.desired_precision.to_le_bytes());
        hasher.update(&[key_switch_code(self.key_switch)]);
        hasher.update(&[scaling_code(self.scaling)]);
        hasher.update(&[match self.secret_key_dist {
            SecretKeyDistribution::UniformTernary => 0,
        }]);
        hasher.update(&self.error_std_dev.to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}

fn security_code(level: SecurityLevel) -> u8 {
    match level {
        SecurityLevel::Classic128 => 0,
        SecurityLevel::Quantum128 => 1,
    }
}

fn key_switch_code(technique: KeySwitchTechnique) -> u8 {
    match technique {
        KeySwitchTechnique::Bv => 0,
        KeySwitchTechnique::Hybrid => 1,
    }
}

fn scaling_code(technique: ScalingTechnique) -> u8 {
    match technique {
        ScalingTechnique::FixedManual => 0,
        ScalingTechnique::FlexibleAuto => 1,
    }
}

/// Default profile for single audio frames: 1024 slots, depth 0.
const PROFILE_FRAME_2048: Profile = Profile {
    id: ProfileId(1),
    name: "frame-2048",
    version: 1,
    security: SecurityLevel::Quantum128,
    ring_dim: 2048,
    modulus: 1_125_899_906_826_241,
    first_mod_bits: 50,
    scaling_mod_bits: 42,
    multiplicative_depth: 0,
    desired_precision: 24,
    key_switch: KeySwitchTechnique::Bv,
    scaling: ScalingTechnique::FlexibleAuto,
    secret_key_dist: SecretKeyDistribution::UniformTernary,
    error_std_dev: 3.19,
};

/// Wider frames (2048 slots) with more headroom above the scale.
const PROFILE_FRAME_4096: Profile = Profile {
    id: ProfileId(2),
    name: "frame-4096",
    version: 1,
    security: SecurityLevel::Classic128,
    ring_dim: 4096,
    modulus: 18_014_398_509_309_953,
    first_mod_bits: 54,
    scaling_mod_bits: 42,
    multiplicative_depth: 0,
    desired_precision: 24,
    key_switch: KeySwitchTechnique::Bv,
    scaling: ScalingTechnique::FlexibleAuto,
    secret_key_dist: SecretKeyDistribution::UniformTernary,
    error_std_dev: 3.19,
};

static PROFILE_SET_STANDARD: [Profile; 2] = [PROFILE_FRAME_2048, PROFILE_FRAME_4096];

#[derive(Clone, Copy, Debug)]
pub struct ProfileRegistry<'a> {
    profiles: &'a [Profile],
}

impl<'a> ProfileRegistry<'a> {
    pub const fn new(profiles: &'a [Profile]) -> Self {
        Self { profiles }
    }

    pub fn standard() -> ProfileRegistry<'static> {
        ProfileRegistry {
            profiles: &PROFILE_SET_STANDARD,
        }
    }

    pub fn profiles(&self) -> &'a [Profile] {
        self.profiles
    }

    pub fn profile_by_id(&self, id: ProfileId) -> Option<&'a Profile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    pub fn profile_by_name(&self, name: &str) -> Option<&'a Profile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }
}

/// Returns the profile new installations are provisioned with.
pub fn default_profile() -> Profile {
    PROFILE_FRAME_2048
}

pub fn standard_profiles() -> &'static [Profile] {
    &PROFILE_SET_STANDARD
}

pub fn registry_standard() -> ProfileRegistry<'static> {
    ProfileRegistry::standard()
}
