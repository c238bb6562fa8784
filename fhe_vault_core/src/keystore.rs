//! Where key store artifacts live.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::codec::{ArtifactKind, KEYS_DIR};

/// Read access to the three key store artifacts.
pub trait KeySource {
    /// Full contents of one artifact. Missing artifacts are
    /// `io::ErrorKind::NotFound`.
    fn read_artifact(&self, kind: ArtifactKind) -> io::Result<Zeroizing<Vec<u8>>>;

    /// Human readable location for logs.
    fn describe(&self) -> String;
}

/// Artifacts stored as files in one directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryKeyStore {
    dir: PathBuf,
}

impl DirectoryKeyStore {
    /// Uses `dir` as-is.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uses `root/keys` when present, otherwise `root` itself.
    pub fn open(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let nested = root.join(KEYS_DIR);
        if nested.is_dir() {
            Self::new(nested)
        } else {
            Self::new(root)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn write_artifact(&self, kind: ArtifactKind, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.artifact_path(kind), bytes)
    }
}

impl KeySource for DirectoryKeyStore {
    fn read_artifact(&self, kind: ArtifactKind) -> io::Result<Zeroizing<Vec<u8>>> {
        fs::read(self.artifact_path(kind)).map(Zeroizing::new)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// In-memory asset bundle, e.g. artifacts compiled in with `include_bytes!`.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    artifacts: HashMap<ArtifactKind, Zeroizing<Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_artifacts(context: &[u8], public_key: &[u8], secret_key: &[u8]) -> Self {
        let mut store = Self::new();
        store.insert(ArtifactKind::Context, context.to_vec());
        store.insert(ArtifactKind::PublicKey, public_key.to_vec());
        store.insert(ArtifactKind::SecretKey, secret_key.to_vec());
        store
    }

    /// Snapshot of every artifact present in `source`.
    pub fn capture(source: &dyn KeySource) -> io::Result<Self> {
        let mut store = Self::new();
        for kind in ArtifactKind::ORDERED {
            store.artifacts.insert(kind, source.read_artifact(kind)?);
        }
        Ok(store)
    }

    pub fn insert(&mut self, kind: ArtifactKind, bytes: Vec<u8>) {
        self.artifacts.insert(kind, Zeroizing::new(bytes));
    }

    pub fn remove(&mut self, kind: ArtifactKind) {
        self.artifacts.remove(&kind);
    }
}

impl KeySource for MemoryKeyStore {
    fn read_artifact(&self, kind: ArtifactKind) -> io::Result<Zeroizing<Vec<u8>>> {
        self.artifacts.get(&kind).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not bundled", kind.file_name()),
            )
        })
    }

    fn describe(&self) -> String {
        format!("memory ({} artifacts)", self.artifacts.len())
    }
}
