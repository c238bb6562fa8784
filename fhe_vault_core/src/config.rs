//! JSON host configuration: profile name and key store location.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::KEYS_DIR;
use crate::error::ConfigError;
use crate::profiles::{Profile, default_profile, registry_standard};

/// Host-side settings. Every field has a default, so `{}` is a valid file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Name of a compiled profile, e.g. `frame-2048`.
    pub profile: String,
    /// Key store location used when the host does not pass one.
    pub keys_dir: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            profile: default_profile().name.to_string(),
            keys_dir: PathBuf::from(KEYS_DIR),
        }
    }
}

impl VaultConfig {
    pub fn with_profile(name: impl Into<String>) -> Self {
        Self {
            profile: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.resolve_profile()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn resolve_profile(&self) -> Result<Profile, ConfigError> {
        registry_standard()
            .profile_by_name(&self.profile)
            .copied()
            .ok_or_else(|| ConfigError::UnknownProfile(self.profile.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_object_uses_defaults() {
        let config = VaultConfig::from_json_str("{}").unwrap();
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.resolve_profile().unwrap().ring_dim, 2048);
        assert_eq!(config.keys_dir, PathBuf::from("keys"));
    }

    #[test]
    fn selects_profile_by_name() {
        let config = VaultConfig::from_json_str(r#"{"profile": "frame-4096"}"#).unwrap();
        assert_eq!(config.resolve_profile().unwrap().slot_capacity(), 2048);
    }

    #[test]
    fn rejects_unknown_profiles_and_fields() {
        assert!(matches!(
            VaultConfig::from_json_str(r#"{"profile": "frame-9"}"#),
            Err(ConfigError::UnknownProfile(name)) if name == "frame-9"
        ));
        assert!(matches!(
            VaultConfig::from_json_str(r#"{"profil": "frame-2048"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, r#"{"keys_dir": "/data/keys"}"#).unwrap();
        let config = VaultConfig::from_json_file(&path).unwrap();
        assert_eq!(config.keys_dir, PathBuf::from("/data/keys"));

        assert!(matches!(
            VaultConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
