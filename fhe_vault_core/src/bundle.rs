//! Public key material for parties that must never decrypt.
//!
//! A bundle carries the public key and context artifacts of one
//! installation:
//!
//! ```text
//! [u32 LE public_len][u32 LE context_len][public artifact][context artifact]
//! ```
//!
//! A [`PublicEvaluator`] built from it can encrypt frames for the
//! installation and add envelopes together without the secret key.

use log::{debug, info};

use crate::codec::{ArtifactKind, decode_artifact, encode_artifact, seal_envelope};
use crate::context::{ContextFingerprint, compute_fingerprint};
use crate::engine::{CkksEngine, HeEngine};
use crate::error::{BundleError, DecryptError, EncryptError};
use crate::manager::ContextManager;
use crate::pipeline::{open_values, seal_values};
use crate::profiles::Profile;

const LENGTH_PREFIX_BYTES: usize = 8;

/// Serializes the live public key and context. The secret key is never
/// included.
pub fn export_public_bundle<E: HeEngine>(
    engine: &E,
    manager: &ContextManager<E>,
) -> Result<Vec<u8>, BundleError> {
    manager
        .with_ready(|active| -> Result<Vec<u8>, BundleError> {
            let public_body = engine.serialize_public_key(&active.context, &active.public_key)?;
            let context_body = engine.serialize_context(&active.context)?;
            let public =
                encode_artifact(ArtifactKind::PublicKey, &active.fingerprint, &public_body)?;
            let context =
                encode_artifact(ArtifactKind::Context, &active.fingerprint, &context_body)?;
            let bytes = frame(&public, &context)?;
            info!(
                "exported public bundle for {} ({} bytes)",
                active.fingerprint.short(),
                bytes.len()
            );
            Ok(bytes)
        })
        .unwrap_or(Err(BundleError::NotInitialized))
}

fn frame(public: &[u8], context: &[u8]) -> Result<Vec<u8>, BundleError> {
    let too_large = |_| BundleError::Malformed("bundle component exceeds 4 GiB".into());
    let public_len = u32::try_from(public.len()).map_err(too_large)?;
    let context_len = u32::try_from(context.len()).map_err(too_large)?;
    let mut bytes = Vec::with_capacity(LENGTH_PREFIX_BYTES + public.len() + context.len());
    bytes.extend_from_slice(&public_len.to_le_bytes());
    bytes.extend_from_slice(&context_len.to_le_bytes());
    bytes.extend_from_slice(public);
    bytes.extend_from_slice(context);
    Ok(bytes)
}

fn unframe(bytes: &[u8]) -> Result<(&[u8], &[u8]), BundleError> {
    if bytes.len() < LENGTH_PREFIX_BYTES {
        return Err(malformed("missing length prefix"));
    }
    let (prefix, rest) = bytes.split_at(LENGTH_PREFIX_BYTES);
    let public_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    let context_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
    if public_len.checked_add(context_len) != Some(rest.len()) {
        return Err(malformed("length prefix does not match payload"));
    }
    Ok(rest.split_at(public_len))
}

fn malformed(reason: impl ToString) -> BundleError {
    BundleError::Malformed(reason.to_string())
}

/// Encrypts and adds ciphertexts for one installation using only its
/// public bundle.
pub struct PublicEvaluator<E: HeEngine = CkksEngine> {
    engine: E,
    context: E::Context,
    public_key: E::PublicKey,
    fingerprint: ContextFingerprint,
    profile: Profile,
}

impl PublicEvaluator<CkksEngine> {
    pub fn from_bundle_default(bytes: &[u8]) -> Result<Self, BundleError> {
        Self::from_bundle(CkksEngine::new(), bytes)
    }
}

impl<E: HeEngine> PublicEvaluator<E> {
    pub fn from_bundle(engine: E, bytes: &[u8]) -> Result<Self, BundleError> {
        let (public_bytes, context_bytes) = unframe(bytes)?;

        let context_artifact =
            decode_artifact(ArtifactKind::Context, context_bytes).map_err(malformed)?;
        let public_artifact =
            decode_artifact(ArtifactKind::PublicKey, public_bytes).map_err(malformed)?;
        let fingerprint = context_artifact.fingerprint;

        let context = engine
            .deserialize_context(context_artifact.body)
            .map_err(malformed)?;
        let profile = engine.context_profile(&context);
        if public_artifact.fingerprint != fingerprint
            || compute_fingerprint(&profile, public_artifact.body) != fingerprint
        {
            return Err(malformed("public key does not belong to the bundled context"));
        }
        let public_key = engine
            .deserialize_public_key(&context, public_artifact.body)
            .map_err(malformed)?;

        debug!("public evaluator ready for {}", fingerprint.short());
        Ok(Self {
            engine,
            context,
            public_key,
            fingerprint,
            profile,
        })
    }

    pub fn fingerprint(&self) -> ContextFingerprint {
        self.fingerprint
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn slot_capacity(&self) -> usize {
        self.engine.slot_capacity(&self.context)
    }

    /// Same envelope format as the installation's own encryption.
    pub fn encrypt(&self, values: &[f32]) -> Result<Vec<u8>, EncryptError> {
        seal_values(
            &self.engine,
            &self.context,
            &self.public_key,
            &self.fingerprint,
            values,
        )
    }

    /// Slot-wise sum of envelopes that all carry this bundle's fingerprint
    /// and the same logical length.
    pub fn sum<B: AsRef<[u8]>>(&self, envelopes: &[B]) -> Result<Vec<u8>, BundleError> {
        let mut total: Option<E::Ciphertext> = None;
        for (index, envelope) in envelopes.iter().enumerate() {
            let ciphertext =
                open_values(&self.engine, &self.context, &self.fingerprint, envelope.as_ref())
                    .map_err(|err| match err {
                        DecryptError::ContextMismatch { .. } => {
                            BundleError::FingerprintMismatch { index }
                        }
                        DecryptError::Engine(err) => BundleError::Engine(err),
                        other => BundleError::Malformed(format!("envelope {index}: {other}")),
                    })?;
            total = Some(match total {
                None => ciphertext,
                Some(acc) => self.engine.add(&self.context, &acc, &ciphertext)?,
            });
        }
        let total = total.ok_or(BundleError::Empty)?;
        let body = self.engine.serialize_ciphertext(&self.context, &total)?;
        debug!("summed {} envelopes", envelopes.len());
        Ok(seal_envelope(&self.fingerprint, &body)?)
    }
}
