//! Key store artifacts and ciphertext envelopes.
//!
//! Both wrap an opaque engine body in a small versioned header that carries
//! the context fingerprint. Layout (bincode, little endian):
//!
//! ```text
//! artifact: magic "FHVK" | kind u32 | version u16 | fingerprint [32] | body len u64 | body
//! envelope: magic "FHVC" |            version u16 | fingerprint [32] | body len u64 | body
//! ```

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

use crate::context::ContextFingerprint;
use crate::error::CodecError;
use crate::versioning::{ARTIFACT_FORMAT_VERSION, CIPHERTEXT_ENVELOPE_VERSION, expect_version};

pub const ARTIFACT_MAGIC: [u8; 4] = *b"FHVK";
pub const ENVELOPE_MAGIC: [u8; 4] = *b"FHVC";

/// Conventional sub-directory of an asset root holding the key store.
pub const KEYS_DIR: &str = "keys";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Context,
    PublicKey,
    SecretKey,
}

impl ArtifactKind {
    /// Write and read order. Keys decode against the context.
    pub const ORDERED: [ArtifactKind; 3] = [
        ArtifactKind::Context,
        ArtifactKind::PublicKey,
        ArtifactKind::SecretKey,
    ];

    pub const fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Context => "crypto_context.bin",
            ArtifactKind::PublicKey => "key_pub.bin",
            ArtifactKind::SecretKey => "key_priv.bin",
        }
    }
}

/// Decoded artifact borrowing its body from the input buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact<'a> {
    pub kind: ArtifactKind,
    pub fingerprint: ContextFingerprint,
    pub body: &'a [u8],
}

#[derive(Serialize)]
struct ArtifactRecord<'a> {
    magic: [u8; 4],
    kind: ArtifactKind,
    version: u16,
    fingerprint: ContextFingerprint,
    body: &'a [u8],
}

impl<'de> Deserialize<'de> for ArtifactRecord<'de> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper<'a> {
            magic: [u8; 4],
            kind: ArtifactKind,
            version: u16,
            fingerprint: ContextFingerprint,
            body: &'a [u8],
        }
        let helper = Helper::deserialize(deserializer)?;
        if helper.magic != ARTIFACT_MAGIC {
            return Err(D::Error::custom("bad artifact magic"));
        }
        expect_version::<D::Error>(helper.version, ARTIFACT_FORMAT_VERSION, "artifact")?;
        Ok(Self {
            magic: helper.magic,
            kind: helper.kind,
            version: helper.version,
            fingerprint: helper.fingerprint,
            body: helper.body,
        })
    }
}

pub fn encode_artifact(
    kind: ArtifactKind,
    fingerprint: &ContextFingerprint,
    body: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let record = ArtifactRecord {
        magic: ARTIFACT_MAGIC,
        kind,
        version: ARTIFACT_FORMAT_VERSION,
        fingerprint: *fingerprint,
        body,
    };
    bincode::serialize(&record).map_err(|source| CodecError::Encode {
        what: kind.file_name(),
        source,
    })
}

pub fn decode_artifact(expected: ArtifactKind, bytes: &[u8]) -> Result<Artifact<'_>, CodecError> {
    let record: ArtifactRecord<'_> =
        bincode::deserialize(bytes).map_err(|err| CodecError::Malformed {
            what: expected.file_name(),
            reason: err.to_string(),
        })?;
    if record.kind != expected {
        return Err(CodecError::WrongKind {
            expected,
            found: record.kind,
        });
    }
    Ok(Artifact {
        kind: record.kind,
        fingerprint: record.fingerprint,
        body: record.body,
    })
}

/// Ciphertext envelope borrowing its engine body.
#[derive(Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub fingerprint: ContextFingerprint,
    pub body: &'a [u8],
}

#[derive(Serialize)]
struct EnvelopeRecord<'a> {
    magic: [u8; 4],
    version: u16,
    fingerprint: ContextFingerprint,
    body: &'a [u8],
}

impl<'de> Deserialize<'de> for EnvelopeRecord<'de> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper<'a> {
            magic: [u8; 4],
            version: u16,
            fingerprint: ContextFingerprint,
            body: &'a [u8],
        }
        let helper = Helper::deserialize(deserializer)?;
        if helper.magic != ENVELOPE_MAGIC {
            return Err(D::Error::custom("bad envelope magic"));
        }
        expect_version::<D::Error>(helper.version, CIPHERTEXT_ENVELOPE_VERSION, "envelope")?;
        Ok(Self {
            magic: helper.magic,
            version: helper.version,
            fingerprint: helper.fingerprint,
            body: helper.body,
        })
    }
}

pub fn seal_envelope(fingerprint: &ContextFingerprint, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let record = EnvelopeRecord {
        magic: ENVELOPE_MAGIC,
        version: CIPHERTEXT_ENVELOPE_VERSION,
        fingerprint: *fingerprint,
        body,
    };
    bincode::serialize(&record).map_err(|source| CodecError::Encode {
        what: "ciphertext envelope",
        source,
    })
}

pub fn open_envelope(bytes: &[u8]) -> Result<Envelope<'_>, CodecError> {
    let record: EnvelopeRecord<'_> =
        bincode::deserialize(bytes).map_err(|err| CodecError::Malformed {
            what: "ciphertext envelope",
            reason: err.to_string(),
        })?;
    Ok(Envelope {
        fingerprint: record.fingerprint,
        body: record.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fingerprint(byte: u8) -> ContextFingerprint {
        ContextFingerprint::from_bytes([byte; 32])
    }

    #[test]
    fn file_names_follow_key_store_layout() {
        let names: Vec<_> = ArtifactKind::ORDERED
            .iter()
            .map(|kind| kind.file_name())
            .collect();
        assert_eq!(names, ["crypto_context.bin", "key_pub.bin", "key_priv.bin"]);
    }

    #[test]
    fn artifact_header_layout() {
        let bytes = encode_artifact(ArtifactKind::PublicKey, &fingerprint(7), b"body").unwrap();
        assert_eq!(&bytes[..4], b"FHVK");
        assert_eq!(bytes.len(), 4 + 4 + 2 + 32 + 8 + 4);

        let artifact = decode_artifact(ArtifactKind::PublicKey, &bytes).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::PublicKey);
        assert_eq!(artifact.fingerprint, fingerprint(7));
        assert_eq!(artifact.body, b"body");
    }

    #[test]
    fn artifact_kind_is_checked() {
        let bytes = encode_artifact(ArtifactKind::SecretKey, &fingerprint(1), b"s").unwrap();
        assert!(matches!(
            decode_artifact(ArtifactKind::PublicKey, &bytes),
            Err(CodecError::WrongKind {
                expected: ArtifactKind::PublicKey,
                found: ArtifactKind::SecretKey
            })
        ));
    }

    #[test]
    fn artifact_rejects_truncation_and_bad_magic() {
        let bytes = encode_artifact(ArtifactKind::Context, &fingerprint(2), &[9; 64]).unwrap();
        assert!(decode_artifact(ArtifactKind::Context, &bytes[..bytes.len() - 1]).is_err());
        assert!(decode_artifact(ArtifactKind::Context, &[]).is_err());

        let mut tampered = bytes.clone();
        tampered[0] = b'X';
        assert!(matches!(
            decode_artifact(ArtifactKind::Context, &tampered),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn artifact_rejects_future_versions() {
        let mut bytes = encode_artifact(ArtifactKind::Context, &fingerprint(2), b"c").unwrap();
        bytes[8] = 9;
        let err = decode_artifact(ArtifactKind::Context, &bytes).unwrap_err();
        assert!(err.to_string().contains("version"), "{err}");
    }

    #[test]
    fn envelope_roundtrip_and_magic() {
        let sealed = seal_envelope(&fingerprint(3), b"ciphertext").unwrap();
        assert_eq!(&sealed[..4], b"FHVC");
        let envelope = open_envelope(&sealed).unwrap();
        assert_eq!(envelope.fingerprint, fingerprint(3));
        assert_eq!(envelope.body, b"ciphertext");

        let artifact = encode_artifact(ArtifactKind::Context, &fingerprint(3), b"c").unwrap();
        assert!(open_envelope(&artifact).is_err());
    }

    proptest! {
        #[test]
        fn fuzz_open_envelope(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = open_envelope(&bytes);
        }
    }
}
