//! Drives the lifecycle through an engine that counts every call it receives.

use std::sync::atomic::{AtomicUsize, Ordering};

use fhe_vault_core::{
    CkksCiphertext, CkksContext, CkksEngine, CkksPublicKey, CkksSecretKey, DecryptError,
    EncryptError, EngineError, FeatureSet, FheVault, HeEngine, LoadError, MemoryKeyStore,
    PackedPlaintext, Profile, VaultConfig,
};
use rand_core::{CryptoRng, RngCore};
use tempfile::tempdir;
use zeroize::Zeroizing;

#[derive(Default)]
struct CountingEngine {
    inner: CkksEngine,
    calls: AtomicUsize,
    releases: AtomicUsize,
}

impl CountingEngine {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl HeEngine for CountingEngine {
    type Context = CkksContext;
    type PublicKey = CkksPublicKey;
    type SecretKey = CkksSecretKey;
    type Plaintext = PackedPlaintext;
    type Ciphertext = CkksCiphertext;

    fn create_context(
        &self,
        profile: &Profile,
        features: FeatureSet,
    ) -> Result<CkksContext, EngineError> {
        self.tick();
        self.inner.create_context(profile, features)
    }

    fn context_profile(&self, ctx: &CkksContext) -> Profile {
        self.tick();
        self.inner.context_profile(ctx)
    }

    fn slot_capacity(&self, ctx: &CkksContext) -> usize {
        self.tick();
        self.inner.slot_capacity(ctx)
    }

    fn keygen_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &CkksContext,
        rng: &mut R,
    ) -> Result<(CkksPublicKey, CkksSecretKey), EngineError> {
        self.tick();
        self.inner.keygen_with_rng(ctx, rng)
    }

    fn pack(&self, ctx: &CkksContext, values: &[f64]) -> Result<PackedPlaintext, EngineError> {
        self.tick();
        self.inner.pack(ctx, values)
    }

    fn unpack(&self, ctx: &CkksContext, plaintext: &PackedPlaintext) -> Vec<f64> {
        self.tick();
        self.inner.unpack(ctx, plaintext)
    }

    fn encrypt_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &CkksContext,
        pk: &CkksPublicKey,
        plaintext: &PackedPlaintext,
        rng: &mut R,
    ) -> Result<CkksCiphertext, EngineError> {
        self.tick();
        self.inner.encrypt_with_rng(ctx, pk, plaintext, rng)
    }

    fn decrypt(
        &self,
        ctx: &CkksContext,
        sk: &CkksSecretKey,
        ciphertext: &CkksCiphertext,
    ) -> Result<PackedPlaintext, EngineError> {
        self.tick();
        self.inner.decrypt(ctx, sk, ciphertext)
    }

    fn add(
        &self,
        ctx: &CkksContext,
        lhs: &CkksCiphertext,
        rhs: &CkksCiphertext,
    ) -> Result<CkksCiphertext, EngineError> {
        self.tick();
        self.inner.add(ctx, lhs, rhs)
    }

    fn serialize_context(&self, ctx: &CkksContext) -> Result<Vec<u8>, EngineError> {
        self.tick();
        self.inner.serialize_context(ctx)
    }

    fn deserialize_context(&self, bytes: &[u8]) -> Result<CkksContext, EngineError> {
        self.tick();
        self.inner.deserialize_context(bytes)
    }

    fn serialize_public_key(
        &self,
        ctx: &CkksContext,
        pk: &CkksPublicKey,
    ) -> Result<Vec<u8>, EngineError> {
        self.tick();
        self.inner.serialize_public_key(ctx, pk)
    }

    fn deserialize_public_key(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksPublicKey, EngineError> {
        self.tick();
        self.inner.deserialize_public_key(ctx, bytes)
    }

    fn serialize_secret_key(
        &self,
        ctx: &CkksContext,
        sk: &CkksSecretKey,
    ) -> Result<Zeroizing<Vec<u8>>, EngineError> {
        self.tick();
        self.inner.serialize_secret_key(ctx, sk)
    }

    fn deserialize_secret_key(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksSecretKey, EngineError> {
        self.tick();
        self.inner.deserialize_secret_key(ctx, bytes)
    }

    fn serialize_ciphertext(
        &self,
        ctx: &CkksContext,
        ciphertext: &CkksCiphertext,
    ) -> Result<Vec<u8>, EngineError> {
        self.tick();
        self.inner.serialize_ciphertext(ctx, ciphertext)
    }

    fn deserialize_ciphertext(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksCiphertext, EngineError> {
        self.tick();
        self.inner.deserialize_ciphertext(ctx, bytes)
    }

    fn release_caches(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release_caches();
    }
}

fn counting_vault() -> FheVault<CountingEngine> {
    FheVault::with_engine(CountingEngine::default(), VaultConfig::default()).unwrap()
}

#[test]
fn uninitialized_vault_never_reaches_the_engine() {
    let vault = counting_vault();
    assert!(matches!(
        vault.encrypt(&[1.0, 2.0]),
        Err(EncryptError::NotInitialized)
    ));
    assert!(matches!(
        vault.decrypt(b"anything"),
        Err(DecryptError::NotInitialized)
    ));
    assert!(vault.export_public_bundle().is_err());
    assert_eq!(vault.engine().calls(), 0);
}

#[test]
fn empty_store_fails_without_touching_the_engine() {
    let vault = counting_vault();
    assert!(matches!(
        vault.load(&MemoryKeyStore::new()),
        Err(LoadError::CorruptKeyStore { .. })
    ));
    assert_eq!(vault.engine().calls(), 0);
}

#[test]
fn caches_are_released_only_when_replacing_a_live_context() {
    let dir = tempdir().unwrap();
    let vault = counting_vault();
    vault.provision(dir.path()).unwrap();
    assert_eq!(vault.engine().releases(), 0);

    vault.provision(dir.path()).unwrap();
    assert_eq!(vault.engine().releases(), 1);
}

#[test]
fn load_while_ready_is_a_no_op() {
    let dir = tempdir().unwrap();
    let vault = counting_vault();
    vault.provision(dir.path()).unwrap();
    let fingerprint = vault.fingerprint();
    let before = vault.engine().calls();

    vault
        .load(&fhe_vault_core::DirectoryKeyStore::new(dir.path()))
        .unwrap();
    assert_eq!(vault.engine().calls(), before);
    assert_eq!(vault.fingerprint(), fingerprint);
    assert_eq!(vault.engine().releases(), 0);
}

#[test]
fn counting_engine_roundtrips() {
    let dir = tempdir().unwrap();
    let vault = counting_vault();
    vault.provision(dir.path()).unwrap();
    let sealed = vault.encrypt(&[0.25, -4.0]).unwrap();
    let opened = vault.decrypt(&sealed).unwrap();
    assert!((opened[0] - 0.25).abs() < 1e-6);
    assert!((opened[1] + 4.0).abs() < 1e-6);
}
