//! Serialization versioning helpers.

use serde::de::Error as DeError;

/// Key store artifact container (header + engine body).
pub const ARTIFACT_FORMAT_VERSION: u16 = 1;
pub const CIPHERTEXT_ENVELOPE_VERSION: u16 = 1;

// Engine body formats.
pub const CONTEXT_RECORD_VERSION: u16 = 1;
pub const PUBLIC_KEY_VERSION: u16 = 1;
pub const SECRET_KEY_VERSION: u16 = 1;
pub const CIPHERTEXT_VERSION: u16 = 1;

pub fn expect_version<E: DeError>(found: u16, expected: u16, label: &'static str) -> Result<(), E> {
    if found == expected {
        return Ok(());
    }
    Err(E::custom(format!(
        "unsupported {label} version {found} (this build reads {expected})"
    )))
}
