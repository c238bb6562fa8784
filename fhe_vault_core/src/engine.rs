//! Homomorphic encryption engine seam and the bundled CKKS engine.
//!
//! The orchestration layer only talks to [`HeEngine`]. Binary formats of the
//! engine's objects are opaque to callers; they are produced and consumed
//! exclusively through the `serialize_*` / `deserialize_*` methods.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use rand_core::{CryptoRng, RngCore};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::encoding::SlotEncoder;
use crate::error::EngineError;
use crate::profiles::{Profile, ProfileId, ProfileRegistry};
use crate::ring::{NttRing, RingElement, RingParams};
use crate::rng::{ErrorSampler, sample_ternary, sample_uniform, secure_rng};
use crate::versioning::{
    CIPHERTEXT_VERSION, CONTEXT_RECORD_VERSION, PUBLIC_KEY_VERSION, SECRET_KEY_VERSION,
    expect_version,
};

/// Operations a context may be asked to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Pke,
    KeySwitch,
    LeveledShe,
}

impl Feature {
    const ALL: [Feature; 3] = [Feature::Pke, Feature::KeySwitch, Feature::LeveledShe];

    fn bit(self) -> u8 {
        match self {
            Feature::Pke => 1,
            Feature::KeySwitch => 2,
            Feature::LeveledShe => 4,
        }
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSet(u8);

impl FeatureSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Public-key encryption, key switching and leveled arithmetic.
    pub const fn standard() -> Self {
        Self(1 | 2 | 4)
    }

    pub fn with(mut self, feature: Feature) -> Self {
        self.0 |= feature.bit();
        self
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.contains(*f))
    }

    fn require(&self, feature: Feature) -> Result<(), EngineError> {
        if self.contains(feature) {
            Ok(())
        } else {
            Err(EngineError::FeatureDisabled(feature))
        }
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), FeatureSet::with)
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A homomorphic encryption backend.
///
/// Contexts, keys, plaintexts and ciphertexts are engine-defined. Key and
/// ciphertext decoding always happens against an already decoded context.
pub trait HeEngine: Send + Sync {
    type Context: Send + Sync;
    type PublicKey: Send + Sync;
    type SecretKey: Send + Sync;
    type Plaintext;
    type Ciphertext: Send + Sync;

    fn create_context(
        &self,
        profile: &Profile,
        features: FeatureSet,
    ) -> Result<Self::Context, EngineError>;

    fn context_profile(&self, ctx: &Self::Context) -> Profile;

    fn slot_capacity(&self, ctx: &Self::Context) -> usize;

    fn keygen_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &Self::Context,
        rng: &mut R,
    ) -> Result<(Self::PublicKey, Self::SecretKey), EngineError>;

    fn keygen(
        &self,
        ctx: &Self::Context,
    ) -> Result<(Self::PublicKey, Self::SecretKey), EngineError> {
        let mut rng = secure_rng();
        self.keygen_with_rng(ctx, &mut rng)
    }

    /// Packs real values into the slots of one plaintext.
    fn pack(&self, ctx: &Self::Context, values: &[f64]) -> Result<Self::Plaintext, EngineError>;

    /// Reads back the packed values at their original logical length.
    fn unpack(&self, ctx: &Self::Context, plaintext: &Self::Plaintext) -> Vec<f64>;

    fn encrypt_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &Self::Context,
        pk: &Self::PublicKey,
        plaintext: &Self::Plaintext,
        rng: &mut R,
    ) -> Result<Self::Ciphertext, EngineError>;

    fn encrypt(
        &self,
        ctx: &Self::Context,
        pk: &Self::PublicKey,
        plaintext: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, EngineError> {
        let mut rng = secure_rng();
        self.encrypt_with_rng(ctx, pk, plaintext, &mut rng)
    }

    fn decrypt(
        &self,
        ctx: &Self::Context,
        sk: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::Plaintext, EngineError>;

    /// Slot-wise sum of two ciphertexts of the same logical length.
    fn add(
        &self,
        ctx: &Self::Context,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, EngineError>;

    fn serialize_context(&self, ctx: &Self::Context) -> Result<Vec<u8>, EngineError>;
    fn deserialize_context(&self, bytes: &[u8]) -> Result<Self::Context, EngineError>;

    fn serialize_public_key(
        &self,
        ctx: &Self::Context,
        pk: &Self::PublicKey,
    ) -> Result<Vec<u8>, EngineError>;
    fn deserialize_public_key(
        &self,
        ctx: &Self::Context,
        bytes: &[u8],
    ) -> Result<Self::PublicKey, EngineError>;

    fn serialize_secret_key(
        &self,
        ctx: &Self::Context,
        sk: &Self::SecretKey,
    ) -> Result<Zeroizing<Vec<u8>>, EngineError>;
    fn deserialize_secret_key(
        &self,
        ctx: &Self::Context,
        bytes: &[u8],
    ) -> Result<Self::SecretKey, EngineError>;

    fn serialize_ciphertext(
        &self,
        ctx: &Self::Context,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Vec<u8>, EngineError>;
    fn deserialize_ciphertext(
        &self,
        ctx: &Self::Context,
        bytes: &[u8],
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Drops precomputed material cached on behalf of previously created
    /// contexts. Contexts still alive keep working.
    fn release_caches(&self);
}

/// Crypto context: profile, enabled features and precomputed tables.
#[derive(Clone, Debug)]
pub struct CkksContext {
    profile: Profile,
    features: FeatureSet,
    ring: Arc<NttRing>,
    encoder: SlotEncoder,
    errors: ErrorSampler,
}

impl CkksContext {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    fn check_profile(&self, kind: &'static str, found: ProfileId) -> Result<(), EngineError> {
        if found == self.profile.id {
            return Ok(());
        }
        Err(EngineError::Decode {
            kind,
            reason: format!("profile {found:?}, context uses {:?}", self.profile.id),
        })
    }

    fn check_element(&self, kind: &'static str, element: &RingElement) -> Result<(), EngineError> {
        if element.is_canonical(self.ring.params()) {
            return Ok(());
        }
        Err(EngineError::Decode {
            kind,
            reason: "ring element out of range".into(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CkksPublicKey {
    pub profile: ProfileId,
    pub b: RingElement,
    pub a: RingElement,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CkksSecretKey {
    #[zeroize(skip)]
    pub profile: ProfileId,
    s: RingElement,
}

impl fmt::Debug for CkksSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksSecretKey")
            .field("profile", &self.profile)
            .field("s", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PackedPlaintext {
    element: RingElement,
    len: usize,
}

impl PackedPlaintext {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CkksCiphertext {
    pub profile: ProfileId,
    pub c0: RingElement,
    pub c1: RingElement,
    /// Logical number of packed values.
    pub slots: usize,
}

impl Serialize for CkksPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CkksPublicKey", 4)?;
        state.serialize_field("version", &PUBLIC_KEY_VERSION)?;
        state.serialize_field("profile", &self.profile)?;
        state.serialize_field("b", &self.b)?;
        state.serialize_field("a", &self.a)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for CkksPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            profile: ProfileId,
            b: RingElement,
            a: RingElement,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, PUBLIC_KEY_VERSION, "public key")?;
        Ok(Self {
            profile: helper.profile,
            b: helper.b,
            a: helper.a,
        })
    }
}

impl Serialize for CkksSecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CkksSecretKey", 3)?;
        state.serialize_field("version", &SECRET_KEY_VERSION)?;
        state.serialize_field("profile", &self.profile)?;
        state.serialize_field("s", &self.s)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for CkksSecretKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            profile: ProfileId,
            s: RingElement,
        }
        let mut helper = Helper::deserialize(deserializer)?;
        if let Err(err) =
            expect_version::<D::Error>(helper.version, SECRET_KEY_VERSION, "secret key")
        {
            helper.s.zeroize();
            return Err(err);
        }
        Ok(Self {
            profile: helper.profile,
            s: helper.s,
        })
    }
}

impl Serialize for CkksCiphertext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CkksCiphertext", 5)?;
        state.serialize_field("version", &CIPHERTEXT_VERSION)?;
        state.serialize_field("profile", &self.profile)?;
        state.serialize_field("c0", &self.c0)?;
        state.serialize_field("c1", &self.c1)?;
        state.serialize_field("slots", &(self.slots as u64))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for CkksCiphertext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            profile: ProfileId,
            c0: RingElement,
            c1: RingElement,
            slots: u64,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, CIPHERTEXT_VERSION, "ciphertext")?;
        Ok(Self {
            profile: helper.profile,
            c0: helper.c0,
            c1: helper.c1,
            slots: helper.slots as usize,
        })
    }
}

/// Serialized form of a context. Parameters are not stored; they are
/// rebuilt from the compiled profile and checked against its digest.
#[derive(Debug, Serialize)]
struct ContextRecord {
    version: u16,
    profile: ProfileId,
    profile_digest: [u8; 32],
    features: Vec<Feature>,
}

impl<'de> Deserialize<'de> for ContextRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            profile: ProfileId,
            profile_digest: [u8; 32],
            features: Vec<Feature>,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, CONTEXT_RECORD_VERSION, "context")?;
        Ok(Self {
            version: helper.version,
            profile: helper.profile,
            profile_digest: helper.profile_digest,
            features: helper.features,
        })
    }
}

/// RLWE public-key CKKS over a single NTT-friendly prime.
///
/// NTT tables are cached per profile digest and shared by every context
/// built for that profile until [`HeEngine::release_caches`] is called.
pub struct CkksEngine {
    registry: ProfileRegistry<'static>,
    tables: Mutex<HashMap<[u8; 32], Arc<NttRing>>>,
}

impl CkksEngine {
    pub fn new() -> Self {
        Self::with_registry(ProfileRegistry::standard())
    }

    /// Engine that only accepts profiles from `registry` when decoding
    /// contexts.
    pub fn with_registry(registry: ProfileRegistry<'static>) -> Self {
        Self {
            registry,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Number of profiles with cached tables.
    pub fn cached_tables(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn ring_for(&self, profile: &Profile) -> Result<Arc<NttRing>, EngineError> {
        let digest = profile.digest();
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ring) = tables.get(&digest) {
            return Ok(Arc::clone(ring));
        }
        let ring = NttRing::new(RingParams::new(profile.ring_dim, profile.modulus)).ok_or(
            EngineError::UnsupportedProfile {
                profile: profile.id,
                reason: "modulus is not an NTT-friendly prime for the ring dimension",
            },
        )?;
        debug!(
            "built NTT tables profile={:?} n={} log_q={}",
            profile.id, profile.ring_dim, profile.first_mod_bits
        );
        let ring = Arc::new(ring);
        tables.insert(digest, Arc::clone(&ring));
        Ok(ring)
    }
}

impl Default for CkksEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CkksEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksEngine")
            .field("profiles", &self.registry.profiles().len())
            .field("cached_tables", &self.cached_tables())
            .finish()
    }
}

fn validate_profile(profile: &Profile) -> Result<(), EngineError> {
    let unsupported = |reason| EngineError::UnsupportedProfile {
        profile: profile.id,
        reason,
    };
    if profile.num_limbs() != 1 {
        return Err(unsupported("only depth-0 single-prime profiles are supported"));
    }
    if 64 - profile.modulus.leading_zeros() != profile.first_mod_bits {
        return Err(unsupported("modulus width does not match first_mod_bits"));
    }
    if profile.scaling_mod_bits + 2 >= profile.first_mod_bits {
        return Err(unsupported("scale leaves no headroom below the modulus"));
    }
    Ok(())
}

fn encode_body<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>, EngineError> {
    bincode::serialize(value).map_err(|source| EngineError::Encode { kind, source })
}

fn decode_body<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T, EngineError> {
    bincode::deserialize(bytes).map_err(|err| EngineError::Decode {
        kind,
        reason: err.to_string(),
    })
}

impl HeEngine for CkksEngine {
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
        validate_profile(profile)?;
        let errors = ErrorSampler::new(profile.error_std_dev).ok_or(
            EngineError::UnsupportedProfile {
                profile: profile.id,
                reason: "invalid error standard deviation",
            },
        )?;
        let ring = self.ring_for(profile)?;
        Ok(CkksContext {
            profile: *profile,
            features,
            ring,
            encoder: SlotEncoder::new(profile.ring_dim, profile.scale()),
            errors,
        })
    }

    fn context_profile(&self, ctx: &CkksContext) -> Profile {
        ctx.profile
    }

    fn slot_capacity(&self, ctx: &CkksContext) -> usize {
        ctx.encoder.capacity()
    }

    fn keygen_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &CkksContext,
        rng: &mut R,
    ) -> Result<(CkksPublicKey, CkksSecretKey), EngineError> {
        ctx.features.require(Feature::Pke)?;
        let ring = &ctx.ring;
        let n = ring.degree();

        let mut s_coeffs = sample_ternary(rng, n);
        let s = ring.from_signed(&s_coeffs);
        s_coeffs.zeroize();
        let a = RingElement::from_coeffs(sample_uniform(rng, n, ring.params().modulus));
        let e = ring.from_signed(&ctx.errors.sample(rng, n));
        let b = ring.add(&ring.neg(&ring.mul(&a, &s)), &e);

        debug!("keygen profile={:?} n={}", ctx.profile.id, n);
        Ok((
            CkksPublicKey {
                profile: ctx.profile.id,
                b,
                a,
            },
            CkksSecretKey {
                profile: ctx.profile.id,
                s,
            },
        ))
    }

    fn pack(&self, ctx: &CkksContext, values: &[f64]) -> Result<PackedPlaintext, EngineError> {
        let capacity = ctx.encoder.capacity();
        if values.len() > capacity {
            return Err(EngineError::CapacityExceeded {
                len: values.len(),
                capacity,
            });
        }
        let coeffs = ctx.encoder.encode_slots(values);
        Ok(PackedPlaintext {
            element: ctx.ring.from_signed(&coeffs),
            len: values.len(),
        })
    }

    fn unpack(&self, ctx: &CkksContext, plaintext: &PackedPlaintext) -> Vec<f64> {
        let coeffs = ctx.ring.to_signed(&plaintext.element);
        ctx.encoder.decode_slots(&coeffs, plaintext.len)
    }

    fn encrypt_with_rng<R: CryptoRng + RngCore>(
        &self,
        ctx: &CkksContext,
        pk: &CkksPublicKey,
        plaintext: &PackedPlaintext,
        rng: &mut R,
    ) -> Result<CkksCiphertext, EngineError> {
        ctx.features.require(Feature::Pke)?;
        if pk.profile != ctx.profile.id {
            return Err(EngineError::OperandMismatch("public key profile"));
        }
        let ring = &ctx.ring;
        let n = ring.degree();

        let u = ring.from_signed(&sample_ternary(rng, n));
        let e0 = ring.from_signed(&ctx.errors.sample(rng, n));
        let e1 = ring.from_signed(&ctx.errors.sample(rng, n));
        let c0 = ring.add(&ring.add(&ring.mul(&pk.b, &u), &e0), &plaintext.element);
        let c1 = ring.add(&ring.mul(&pk.a, &u), &e1);

        debug!(
            "encrypt profile={:?} slots={}/{}",
            ctx.profile.id,
            plaintext.len,
            ctx.encoder.capacity()
        );
        Ok(CkksCiphertext {
            profile: ctx.profile.id,
            c0,
            c1,
            slots: plaintext.len,
        })
    }

    fn decrypt(
        &self,
        ctx: &CkksContext,
        sk: &CkksSecretKey,
        ciphertext: &CkksCiphertext,
    ) -> Result<PackedPlaintext, EngineError> {
        ctx.features.require(Feature::Pke)?;
        if sk.profile != ctx.profile.id || ciphertext.profile != ctx.profile.id {
            return Err(EngineError::OperandMismatch("profile"));
        }
        let ring = &ctx.ring;
        let element = ring.add(&ciphertext.c0, &ring.mul(&ciphertext.c1, &sk.s));
        debug!(
            "decrypt profile={:?} slots={}",
            ctx.profile.id, ciphertext.slots
        );
        Ok(PackedPlaintext {
            element,
            len: ciphertext.slots,
        })
    }

    fn add(
        &self,
        ctx: &CkksContext,
        lhs: &CkksCiphertext,
        rhs: &CkksCiphertext,
    ) -> Result<CkksCiphertext, EngineError> {
        ctx.features.require(Feature::LeveledShe)?;
        if lhs.profile != ctx.profile.id || rhs.profile != ctx.profile.id {
            return Err(EngineError::OperandMismatch("profile"));
        }
        if lhs.slots != rhs.slots {
            return Err(EngineError::OperandMismatch("slot count"));
        }
        let ring = &ctx.ring;
        Ok(CkksCiphertext {
            profile: ctx.profile.id,
            c0: ring.add(&lhs.c0, &rhs.c0),
            c1: ring.add(&lhs.c1, &rhs.c1),
            slots: lhs.slots,
        })
    }

    fn serialize_context(&self, ctx: &CkksContext) -> Result<Vec<u8>, EngineError> {
        let record = ContextRecord {
            version: CONTEXT_RECORD_VERSION,
            profile: ctx.profile.id,
            profile_digest: ctx.profile.digest(),
            features: ctx.features.iter().collect(),
        };
        encode_body("context", &record)
    }

    fn deserialize_context(&self, bytes: &[u8]) -> Result<CkksContext, EngineError> {
        let record: ContextRecord = decode_body("context", bytes)?;
        let profile = self
            .registry
            .profile_by_id(record.profile)
            .ok_or_else(|| EngineError::Decode {
                kind: "context",
                reason: format!("unknown profile {:?}", record.profile),
            })?;
        if profile.digest() != record.profile_digest {
            return Err(EngineError::Decode {
                kind: "context",
                reason: format!("parameters of profile {:?} changed", record.profile),
            });
        }
        self.create_context(profile, record.features.into_iter().collect())
    }

    fn serialize_public_key(
        &self,
        _ctx: &CkksContext,
        pk: &CkksPublicKey,
    ) -> Result<Vec<u8>, EngineError> {
        encode_body("public key", pk)
    }

    fn deserialize_public_key(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksPublicKey, EngineError> {
        let pk: CkksPublicKey = decode_body("public key", bytes)?;
        ctx.check_profile("public key", pk.profile)?;
        ctx.check_element("public key", &pk.b)?;
        ctx.check_element("public key", &pk.a)?;
        Ok(pk)
    }

    fn serialize_secret_key(
        &self,
        _ctx: &CkksContext,
        sk: &CkksSecretKey,
    ) -> Result<Zeroizing<Vec<u8>>, EngineError> {
        encode_body("secret key", sk).map(Zeroizing::new)
    }

    fn deserialize_secret_key(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksSecretKey, EngineError> {
        let sk: CkksSecretKey = decode_body("secret key", bytes)?;
        ctx.check_profile("secret key", sk.profile)?;
        ctx.check_element("secret key", &sk.s)?;
        Ok(sk)
    }

    fn serialize_ciphertext(
        &self,
        _ctx: &CkksContext,
        ciphertext: &CkksCiphertext,
    ) -> Result<Vec<u8>, EngineError> {
        encode_body("ciphertext", ciphertext)
    }

    fn deserialize_ciphertext(
        &self,
        ctx: &CkksContext,
        bytes: &[u8],
    ) -> Result<CkksCiphertext, EngineError> {
        let ciphertext: CkksCiphertext = decode_body("ciphertext", bytes)?;
        ctx.check_profile("ciphertext", ciphertext.profile)?;
        ctx.check_element("ciphertext", &ciphertext.c0)?;
        ctx.check_element("ciphertext", &ciphertext.c1)?;
        if ciphertext.slots > ctx.encoder.capacity() {
            return Err(EngineError::Decode {
                kind: "ciphertext",
                reason: format!("{} slots exceed capacity", ciphertext.slots),
            });
        }
        Ok(ciphertext)
    }

    fn release_caches(&self) {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let released = tables.len();
        tables.clear();
        info!("released cached tables for {released} profile(s)");
    }
}
