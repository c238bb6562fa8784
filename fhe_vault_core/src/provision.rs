//! First-run key generation and persistence.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use rand_core::{CryptoRng, RngCore};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::codec::{ArtifactKind, encode_artifact};
use crate::context::compute_fingerprint;
use crate::engine::{FeatureSet, HeEngine};
use crate::error::ProvisionError;
use crate::keystore::DirectoryKeyStore;
use crate::manager::{ActiveContext, ContextManager};
use crate::profiles::Profile;
use crate::rng::secure_rng;

/// Generates a fresh context and key pair for `profile`, writes the three
/// artifacts into `output_directory` and installs the triple.
///
/// Running it again replaces the installation; ciphertexts produced under
/// the previous keys no longer decrypt.
pub fn provision<E: HeEngine>(
    engine: &E,
    manager: &ContextManager<E>,
    profile: &Profile,
    output_directory: &Path,
) -> Result<(), ProvisionError> {
    let mut rng = secure_rng();
    provision_with_rng(engine, manager, profile, output_directory, &mut rng)
}

pub fn provision_with_rng<E: HeEngine, R: CryptoRng + RngCore>(
    engine: &E,
    manager: &ContextManager<E>,
    profile: &Profile,
    output_directory: &Path,
    rng: &mut R,
) -> Result<(), ProvisionError> {
    let store = prepare_target(output_directory)?;
    let mut writer = manager.write();
    if writer.is_ready() {
        warn!(
            "re-provisioning into {}; existing ciphertexts will not decrypt",
            store.dir().display()
        );
    }

    let context = engine.create_context(profile, FeatureSet::standard())?;
    let (public_key, secret_key) = engine.keygen_with_rng(&context, rng)?;

    let public_body = engine
        .serialize_public_key(&context, &public_key)
        .map_err(|err| failed(ArtifactKind::PublicKey, err))?;
    let fingerprint = compute_fingerprint(profile, &public_body);

    for kind in ArtifactKind::ORDERED {
        let body = match kind {
            ArtifactKind::Context => Zeroizing::new(
                engine
                    .serialize_context(&context)
                    .map_err(|err| failed(kind, err))?,
            ),
            ArtifactKind::PublicKey => Zeroizing::new(public_body.clone()),
            ArtifactKind::SecretKey => engine
                .serialize_secret_key(&context, &secret_key)
                .map_err(|err| failed(kind, err))?,
        };
        let bytes = Zeroizing::new(
            encode_artifact(kind, &fingerprint, &body).map_err(|err| failed(kind, err))?,
        );
        store
            .write_artifact(kind, &bytes)
            .map_err(|err| failed(kind, err))?;
        debug!("wrote {} ({} bytes)", kind.file_name(), bytes.len());
    }

    info!(
        "provisioned profile {} into {}",
        profile.name,
        store.dir().display()
    );
    writer.install(
        engine,
        ActiveContext {
            context,
            public_key,
            secret_key,
            fingerprint,
            profile: *profile,
        },
    );
    Ok(())
}

fn prepare_target(output_directory: &Path) -> Result<DirectoryKeyStore, ProvisionError> {
    let invalid = || ProvisionError::InvalidTarget(output_directory.to_path_buf());
    if output_directory.as_os_str().is_empty() {
        return Err(invalid());
    }
    if let Err(err) = fs::create_dir_all(output_directory) {
        warn!(
            "cannot create key directory {}: {err}",
            output_directory.display()
        );
        return Err(invalid());
    }
    if !output_directory.is_dir() {
        return Err(invalid());
    }
    // Scratch file is removed when dropped.
    if let Err(err) = NamedTempFile::new_in(output_directory) {
        warn!(
            "key directory {} is not writable: {err}",
            output_directory.display()
        );
        return Err(invalid());
    }
    Ok(DirectoryKeyStore::new(output_directory))
}

fn failed(kind: ArtifactKind, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::SerializationFailed {
        artifact: kind.file_name(),
        reason: err.to_string(),
    }
}
