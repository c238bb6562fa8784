//! On-device homomorphic encryption vault.
//!
//! Provisions or loads one CKKS context per installation and encrypts
//! real-valued frames into opaque, fingerprinted ciphertext envelopes.

pub mod bundle;
pub mod codec;
pub mod config;
pub mod context;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod loader;
pub mod manager;
pub mod pipeline;
pub mod profiles;
pub mod provision;
pub mod ring;
pub mod rng;
pub mod service;
pub mod versioning;

pub use crate::bundle::{PublicEvaluator, export_public_bundle};
pub use crate::codec::{ArtifactKind, KEYS_DIR};
pub use crate::config::VaultConfig;
pub use crate::context::ContextFingerprint;
pub use crate::encoding::{decode, encode};
pub use crate::engine::{
    CkksCiphertext, CkksContext, CkksEngine, CkksPublicKey, CkksSecretKey, Feature, FeatureSet,
    HeEngine, PackedPlaintext,
};
pub use crate::error::{
    BundleError, CodecError, ConfigError, DecryptError, EncryptError, EngineError, LoadError,
    ProvisionError,
};
pub use crate::keystore::{DirectoryKeyStore, KeySource, MemoryKeyStore};
pub use crate::manager::{ActiveContext, ContextManager, ContextState};
pub use crate::profiles::{
    Profile, ProfileId, ProfileRegistry, default_profile, registry_standard, standard_profiles,
};
pub use crate::rng::{SecureRng, derive_seeded_rng, secure_rng};
pub use crate::service::FheVault;
pub use crate::versioning::*;
