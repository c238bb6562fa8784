//! Restores a provisioned installation from its key store.

use log::{debug, info, warn};
use zeroize::Zeroizing;

use crate::codec::{Artifact, ArtifactKind, decode_artifact};
use crate::context::{ContextFingerprint, compute_fingerprint};
use crate::engine::HeEngine;
use crate::error::LoadError;
use crate::keystore::KeySource;
use crate::manager::{ActiveContext, ContextManager};

const PROBE: [f64; 2] = [0.5, -0.25];
const PROBE_TOLERANCE: f64 = 1e-3;

/// Loads context, public key and secret key from `store` and installs them.
///
/// A manager that is already `Ready` is left untouched. On any failure the
/// manager stays `Uninitialized`.
pub fn load<E: HeEngine, S: KeySource + ?Sized>(
    engine: &E,
    manager: &ContextManager<E>,
    store: &S,
) -> Result<(), LoadError> {
    let mut writer = manager.write();
    if let Some(fingerprint) = writer.fingerprint() {
        warn!(
            "context {} already loaded; ignoring key store {}",
            fingerprint.short(),
            store.describe()
        );
        return Ok(());
    }

    let context_bytes = read(store, ArtifactKind::Context)?;
    let context_artifact = decode(ArtifactKind::Context, &context_bytes)?;
    let fingerprint = context_artifact.fingerprint;
    let context = engine
        .deserialize_context(context_artifact.body)
        .map_err(|err| corrupt(ArtifactKind::Context, err))?;
    let profile = engine.context_profile(&context);

    let public_bytes = read(store, ArtifactKind::PublicKey)?;
    let public_artifact = decode(ArtifactKind::PublicKey, &public_bytes)?;
    expect_fingerprint(&public_artifact, fingerprint)?;
    if compute_fingerprint(&profile, public_artifact.body) != fingerprint {
        return Err(corrupt(
            ArtifactKind::PublicKey,
            "public key does not belong to this context",
        ));
    }
    let public_key = engine
        .deserialize_public_key(&context, public_artifact.body)
        .map_err(|err| corrupt(ArtifactKind::PublicKey, err))?;

    let secret_bytes = read(store, ArtifactKind::SecretKey)?;
    let secret_artifact = decode(ArtifactKind::SecretKey, &secret_bytes)?;
    expect_fingerprint(&secret_artifact, fingerprint)?;
    let secret_key = engine
        .deserialize_secret_key(&context, secret_artifact.body)
        .map_err(|err| corrupt(ArtifactKind::SecretKey, err))?;

    probe_key_pair(engine, &context, &public_key, &secret_key)?;

    info!(
        "loaded context {} (profile {}) from {}",
        fingerprint.short(),
        profile.name,
        store.describe()
    );
    writer.install(
        engine,
        ActiveContext {
            context,
            public_key,
            secret_key,
            fingerprint,
            profile,
        },
    );
    Ok(())
}

fn read<S: KeySource + ?Sized>(
    store: &S,
    kind: ArtifactKind,
) -> Result<Zeroizing<Vec<u8>>, LoadError> {
    let bytes = store.read_artifact(kind).map_err(|err| corrupt(kind, err))?;
    debug!("read {} ({} bytes)", kind.file_name(), bytes.len());
    Ok(bytes)
}

fn decode(kind: ArtifactKind, bytes: &[u8]) -> Result<Artifact<'_>, LoadError> {
    decode_artifact(kind, bytes).map_err(|err| corrupt(kind, err))
}

fn expect_fingerprint(
    artifact: &Artifact<'_>,
    expected: ContextFingerprint,
) -> Result<(), LoadError> {
    if artifact.fingerprint == expected {
        return Ok(());
    }
    Err(corrupt(
        artifact.kind,
        format!(
            "fingerprint {} does not match context {}",
            artifact.fingerprint.short(),
            expected.short()
        ),
    ))
}

/// Encrypts a fixed vector under the public key and checks the secret key
/// recovers it.
fn probe_key_pair<E: HeEngine>(
    engine: &E,
    context: &E::Context,
    public_key: &E::PublicKey,
    secret_key: &E::SecretKey,
) -> Result<(), LoadError> {
    let mismatch = |err: String| corrupt(ArtifactKind::SecretKey, err);
    let plaintext = engine
        .pack(context, &PROBE)
        .map_err(|err| mismatch(err.to_string()))?;
    let ciphertext = engine
        .encrypt(context, public_key, &plaintext)
        .map_err(|err| mismatch(err.to_string()))?;
    let recovered = engine
        .decrypt(context, secret_key, &ciphertext)
        .map(|plaintext| engine.unpack(context, &plaintext))
        .map_err(|err| mismatch(err.to_string()))?;
    let matches = recovered.len() == PROBE.len()
        && PROBE
            .iter()
            .zip(&recovered)
            .all(|(a, b)| (a - b).abs() < PROBE_TOLERANCE);
    if !matches {
        return Err(mismatch("secret key does not match public key".into()));
    }
    Ok(())
}

fn corrupt(kind: ArtifactKind, reason: impl ToString) -> LoadError {
    LoadError::CorruptKeyStore {
        artifact: kind.file_name(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CkksEngine;
    use crate::keystore::{DirectoryKeyStore, MemoryKeyStore};
    use crate::profiles::default_profile;
    use crate::provision::provision;
    use tempfile::tempdir;

    fn provisioned() -> (tempfile::TempDir, ContextFingerprint) {
        let dir = tempdir().unwrap();
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        provision(&engine, &manager, &default_profile(), dir.path()).unwrap();
        (dir, manager.fingerprint().unwrap())
    }

    fn artifact_name(err: LoadError) -> &'static str {
        match err {
            LoadError::CorruptKeyStore { artifact, .. } => artifact,
        }
    }

    #[test]
    fn loads_what_provisioning_wrote() {
        let (dir, fingerprint) = provisioned();
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        load(&engine, &manager, &DirectoryKeyStore::new(dir.path())).unwrap();
        assert_eq!(manager.fingerprint(), Some(fingerprint));
    }

    #[test]
    fn second_load_is_a_no_op() {
        let (first, fingerprint) = provisioned();
        let (second, _) = provisioned();
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        load(&engine, &manager, &DirectoryKeyStore::new(first.path())).unwrap();
        let cached = engine.cached_tables();

        load(&engine, &manager, &DirectoryKeyStore::new(second.path())).unwrap();
        assert_eq!(manager.fingerprint(), Some(fingerprint));
        assert_eq!(engine.cached_tables(), cached);
    }

    #[test]
    fn missing_artifact_is_reported_by_name() {
        let (dir, _) = provisioned();
        let mut store = MemoryKeyStore::capture(&DirectoryKeyStore::new(dir.path())).unwrap();
        store.remove(ArtifactKind::SecretKey);

        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        let err = load(&engine, &manager, &store).unwrap_err();
        assert_eq!(artifact_name(err), "key_priv.bin");
        assert!(!manager.is_ready());
    }

    #[test]
    fn truncated_context_is_corrupt() {
        let (dir, _) = provisioned();
        let disk = DirectoryKeyStore::new(dir.path());
        let mut store = MemoryKeyStore::capture(&disk).unwrap();
        let bytes = disk.read_artifact(ArtifactKind::Context).unwrap();
        store.insert(ArtifactKind::Context, bytes[..bytes.len() / 2].to_vec());

        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        let err = load(&engine, &manager, &store).unwrap_err();
        assert_eq!(artifact_name(err), "crypto_context.bin");
        assert!(!manager.is_ready());
    }

    #[test]
    fn mixed_installations_are_rejected() {
        let (a, _) = provisioned();
        let (b, _) = provisioned();
        let disk_a = DirectoryKeyStore::new(a.path());
        let disk_b = DirectoryKeyStore::new(b.path());
        let engine = CkksEngine::new();

        let mut foreign_public = MemoryKeyStore::capture(&disk_a).unwrap();
        foreign_public.insert(
            ArtifactKind::PublicKey,
            disk_b.read_artifact(ArtifactKind::PublicKey).unwrap().to_vec(),
        );
        let manager = ContextManager::new();
        let err = load(&engine, &manager, &foreign_public).unwrap_err();
        assert_eq!(artifact_name(err), "key_pub.bin");

        let mut foreign_secret = MemoryKeyStore::capture(&disk_a).unwrap();
        foreign_secret.insert(
            ArtifactKind::SecretKey,
            disk_b.read_artifact(ArtifactKind::SecretKey).unwrap().to_vec(),
        );
        let err = load(&engine, &manager, &foreign_secret).unwrap_err();
        assert_eq!(artifact_name(err), "key_priv.bin");
        assert!(!manager.is_ready());
    }

    #[test]
    fn swapped_files_are_rejected() {
        let (dir, _) = provisioned();
        let disk = DirectoryKeyStore::new(dir.path());
        let mut store = MemoryKeyStore::capture(&disk).unwrap();
        store.insert(
            ArtifactKind::PublicKey,
            disk.read_artifact(ArtifactKind::SecretKey).unwrap().to_vec(),
        );
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        let err = load(&engine, &manager, &store).unwrap_err();
        assert_eq!(artifact_name(err), "key_pub.bin");
    }
}
