//! Host-facing facade over the context lifecycle.

use std::path::Path;

use crate::bundle::export_public_bundle;
use crate::config::VaultConfig;
use crate::context::ContextFingerprint;
use crate::engine::{CkksEngine, HeEngine};
use crate::error::{BundleError, ConfigError, DecryptError, EncryptError, LoadError, ProvisionError};
use crate::keystore::{DirectoryKeyStore, KeySource};
use crate::manager::ContextManager;
use crate::profiles::Profile;
use crate::{loader, pipeline, provision};

/// One on-device installation: engine, live context and settings.
///
/// All methods take `&self`; share it between threads with `Arc`.
pub struct FheVault<E: HeEngine = CkksEngine> {
    engine: E,
    manager: ContextManager<E>,
    config: VaultConfig,
    profile: Profile,
}

impl FheVault<CkksEngine> {
    pub fn new(config: VaultConfig) -> Result<Self, ConfigError> {
        Self::with_engine(CkksEngine::new(), config)
    }
}

impl Default for FheVault<CkksEngine> {
    fn default() -> Self {
        let config = VaultConfig::default();
        let profile = crate::profiles::default_profile();
        Self {
            engine: CkksEngine::new(),
            manager: ContextManager::new(),
            config,
            profile,
        }
    }
}

impl<E: HeEngine> FheVault<E> {
    pub fn with_engine(engine: E, config: VaultConfig) -> Result<Self, ConfigError> {
        let profile = config.resolve_profile()?;
        Ok(Self {
            engine,
            manager: ContextManager::new(),
            config,
            profile,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Profile used for provisioning.
    pub fn configured_profile(&self) -> &Profile {
        &self.profile
    }

    /// Profile of the live context, which after `load` may differ from the
    /// configured one.
    pub fn active_profile(&self) -> Option<Profile> {
        self.manager.profile()
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    pub fn fingerprint(&self) -> Option<ContextFingerprint> {
        self.manager.fingerprint()
    }

    pub fn provision(&self, output_directory: impl AsRef<Path>) -> Result<(), ProvisionError> {
        provision::provision(
            &self.engine,
            &self.manager,
            &self.profile,
            output_directory.as_ref(),
        )
    }

    pub fn load<S: KeySource + ?Sized>(&self, store: &S) -> Result<(), LoadError> {
        loader::load(&self.engine, &self.manager, store)
    }

    /// Loads from the configured `keys_dir`.
    pub fn load_configured(&self) -> Result<(), LoadError> {
        self.load(&DirectoryKeyStore::open(&self.config.keys_dir))
    }

    pub fn encrypt(&self, values: &[f32]) -> Result<Vec<u8>, EncryptError> {
        pipeline::encrypt(&self.engine, &self.manager, values)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<f32>, DecryptError> {
        pipeline::decrypt(&self.engine, &self.manager, ciphertext)
    }

    pub fn export_public_bundle(&self) -> Result<Vec<u8>, BundleError> {
        export_public_bundle(&self.engine, &self.manager)
    }
}
