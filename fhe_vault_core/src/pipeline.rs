//! Per-frame encryption and decryption against the live context.

use log::debug;

use crate::codec::{open_envelope, seal_envelope};
use crate::context::ContextFingerprint;
use crate::encoding::{decode, encode};
use crate::engine::HeEngine;
use crate::error::{DecryptError, EncryptError, EngineError};
use crate::manager::ContextManager;

/// Encrypts `values` under the live public key and returns envelope bytes.
pub fn encrypt<E: HeEngine>(
    engine: &E,
    manager: &ContextManager<E>,
    values: &[f32],
) -> Result<Vec<u8>, EncryptError> {
    manager
        .with_ready(|active| {
            seal_values(
                engine,
                &active.context,
                &active.public_key,
                &active.fingerprint,
                values,
            )
        })
        .unwrap_or(Err(EncryptError::NotInitialized))
}

/// Decrypts envelope bytes produced under the live context.
pub fn decrypt<E: HeEngine>(
    engine: &E,
    manager: &ContextManager<E>,
    bytes: &[u8],
) -> Result<Vec<f32>, DecryptError> {
    manager
        .with_ready(|active| -> Result<Vec<f32>, DecryptError> {
            let ciphertext = open_values(engine, &active.context, &active.fingerprint, bytes)?;
            let plaintext = engine.decrypt(&active.context, &active.secret_key, &ciphertext)?;
            let values = engine.unpack(&active.context, &plaintext);
            debug!("decrypted {} values", values.len());
            Ok(decode(&values))
        })
        .unwrap_or(Err(DecryptError::NotInitialized))
}

pub(crate) fn seal_values<E: HeEngine>(
    engine: &E,
    context: &E::Context,
    public_key: &E::PublicKey,
    fingerprint: &ContextFingerprint,
    values: &[f32],
) -> Result<Vec<u8>, EncryptError> {
    let plaintext = engine.pack(context, &encode(values))?;
    let ciphertext = engine.encrypt(context, public_key, &plaintext)?;
    let body = engine.serialize_ciphertext(context, &ciphertext)?;
    let sealed = seal_envelope(fingerprint, &body)?;
    debug!(
        "sealed {} values into {} bytes",
        values.len(),
        sealed.len()
    );
    Ok(sealed)
}

/// Parses an envelope and checks it belongs to `fingerprint`.
pub(crate) fn open_values<E: HeEngine>(
    engine: &E,
    context: &E::Context,
    fingerprint: &ContextFingerprint,
    bytes: &[u8],
) -> Result<E::Ciphertext, DecryptError> {
    let envelope =
        open_envelope(bytes).map_err(|err| DecryptError::MalformedCiphertext(err.to_string()))?;
    if envelope.fingerprint != *fingerprint {
        return Err(DecryptError::ContextMismatch {
            expected: *fingerprint,
            found: envelope.fingerprint,
        });
    }
    engine
        .deserialize_ciphertext(context, envelope.body)
        .map_err(|err| match err {
            EngineError::Decode { .. } => DecryptError::MalformedCiphertext(err.to_string()),
            other => DecryptError::Engine(other),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CkksEngine;
    use crate::profiles::default_profile;
    use crate::provision::provision;
    use tempfile::tempdir;

    fn ready() -> (tempfile::TempDir, CkksEngine, ContextManager<CkksEngine>) {
        let dir = tempdir().unwrap();
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        provision(&engine, &manager, &default_profile(), dir.path()).unwrap();
        (dir, engine, manager)
    }

    #[test]
    fn uninitialized_manager_refuses_both_directions() {
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        assert!(matches!(
            encrypt(&engine, &manager, &[1.0]),
            Err(EncryptError::NotInitialized)
        ));
        assert!(matches!(
            decrypt(&engine, &manager, &[0u8; 64]),
            Err(DecryptError::NotInitialized)
        ));
    }

    #[test]
    fn frame_roundtrip() {
        let (_dir, engine, manager) = ready();
        let frame = [1.5f32, -2.25, 0.0];
        let sealed = encrypt(&engine, &manager, &frame).unwrap();
        let opened = decrypt(&engine, &manager, &sealed).unwrap();
        assert_eq!(opened.len(), frame.len());
        for (a, b) in frame.iter().zip(&opened) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn capacity_boundary() {
        let (_dir, engine, manager) = ready();
        let capacity = default_profile().slot_capacity();
        assert!(encrypt(&engine, &manager, &vec![0.25; capacity]).is_ok());
        match encrypt(&engine, &manager, &vec![0.25; capacity + 1]) {
            Err(EncryptError::CapacityExceeded { len, capacity: c }) => {
                assert_eq!((len, c), (capacity + 1, capacity));
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let (_dir, engine, manager) = ready();
        assert!(matches!(
            decrypt(&engine, &manager, b"not a ciphertext"),
            Err(DecryptError::MalformedCiphertext(_))
        ));

        let mut sealed = encrypt(&engine, &manager, &[1.0, 2.0]).unwrap();
        sealed.truncate(sealed.len() - 10);
        assert!(matches!(
            decrypt(&engine, &manager, &sealed),
            Err(DecryptError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn foreign_fingerprint_is_a_context_mismatch() {
        let (_dir, engine, manager) = ready();
        let sealed = encrypt(&engine, &manager, &[1.0]).unwrap();
        let envelope = open_envelope(&sealed).unwrap();
        let forged =
            seal_envelope(&ContextFingerprint::from_bytes([0; 32]), envelope.body).unwrap();
        assert!(matches!(
            decrypt(&engine, &manager, &forged),
            Err(DecryptError::ContextMismatch { .. })
        ));
    }
}
