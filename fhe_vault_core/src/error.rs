use std::path::PathBuf;

use thiserror::Error;

use crate::codec::ArtifactKind;
use crate::context::ContextFingerprint;
use crate::engine::Feature;
use crate::profiles::ProfileId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("profile {profile:?} is not supported: {reason}")]
    UnsupportedProfile {
        profile: ProfileId,
        reason: &'static str,
    },

    #[error("{len} values exceed the slot capacity of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error("{0:?} is not enabled on this context")]
    FeatureDisabled(Feature),

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("malformed {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },

    #[error("operand mismatch: {0}")]
    OperandMismatch(&'static str),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("expected {expected:?} artifact, found {found:?}")]
    WrongKind {
        expected: ArtifactKind,
        found: ArtifactKind,
    },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{} is not a usable key directory", .0.display())]
    InvalidTarget(PathBuf),

    #[error("failed to write {artifact}: {reason}")]
    SerializationFailed {
        artifact: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("key store artifact {artifact} is missing or corrupt: {reason}")]
    CorruptKeyStore {
        artifact: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("no crypto context is loaded")]
    NotInitialized,

    #[error("{len} values exceed the slot capacity of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error(transparent)]
    Engine(EngineError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<EngineError> for EncryptError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::CapacityExceeded { len, capacity } => {
                Self::CapacityExceeded { len, capacity }
            }
            other => Self::Engine(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("no crypto context is loaded")]
    NotInitialized,

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("ciphertext belongs to context {found:?}, active context is {expected:?}")]
    ContextMismatch {
        expected: ContextFingerprint,
        found: ContextFingerprint,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("no crypto context is loaded")]
    NotInitialized,

    #[error("malformed public bundle: {0}")]
    Malformed(String),

    #[error("envelope {index} does not belong to this bundle's context")]
    FingerprintMismatch { index: usize },

    #[error("nothing to sum")]
    Empty,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown profile {0:?}")]
    UnknownProfile(String),
}
