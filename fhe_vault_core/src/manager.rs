//! Ownership of the live crypto context.
//!
//! A [`ContextManager`] holds at most one context triple (context, public
//! key, secret key). Pipelines take the read lock for one call; provisioning
//! and loading take the write lock for their whole run.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;

use crate::context::ContextFingerprint;
use crate::engine::HeEngine;
use crate::profiles::Profile;

/// The live triple plus what identifies it.
pub struct ActiveContext<E: HeEngine> {
    pub context: E::Context,
    pub public_key: E::PublicKey,
    pub secret_key: E::SecretKey,
    pub fingerprint: ContextFingerprint,
    pub profile: Profile,
}

impl<E: HeEngine> fmt::Debug for ActiveContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveContext")
            .field("profile", &self.profile.name)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

pub enum ContextState<E: HeEngine> {
    Uninitialized,
    Ready(ActiveContext<E>),
}

impl<E: HeEngine> ContextState<E> {
    pub fn active(&self) -> Option<&ActiveContext<E>> {
        match self {
            ContextState::Uninitialized => None,
            ContextState::Ready(active) => Some(active),
        }
    }
}

pub struct ContextManager<E: HeEngine> {
    state: RwLock<ContextState<E>>,
}

impl<E: HeEngine> ContextManager<E> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ContextState::Uninitialized),
        }
    }

    // State changes are single assignments; a poisoned lock still holds a
    // whole value.
    fn read(&self) -> RwLockReadGuard<'_, ContextState<E>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access for the duration of a provisioning or load run.
    pub fn write(&self) -> ContextWriter<'_, E> {
        ContextWriter {
            guard: self.state.write().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.read().active().is_some()
    }

    pub fn fingerprint(&self) -> Option<ContextFingerprint> {
        self.read().active().map(|active| active.fingerprint)
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read().active().map(|active| active.profile)
    }

    /// Runs `f` against the live triple under the read lock, or returns
    /// `None` without calling it.
    pub fn with_ready<T>(&self, f: impl FnOnce(&ActiveContext<E>) -> T) -> Option<T> {
        self.read().active().map(f)
    }

    /// Replaces the live triple, releasing engine caches if one was live.
    pub fn install(&self, engine: &E, active: ActiveContext<E>) {
        self.write().install(engine, active);
    }
}

impl<E: HeEngine> Default for ContextManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HeEngine> fmt::Debug for ContextManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Write-locked view of a [`ContextManager`].
pub struct ContextWriter<'a, E: HeEngine> {
    guard: RwLockWriteGuard<'a, ContextState<E>>,
}

impl<E: HeEngine> ContextWriter<'_, E> {
    pub fn is_ready(&self) -> bool {
        self.guard.active().is_some()
    }

    pub fn fingerprint(&self) -> Option<ContextFingerprint> {
        self.guard.active().map(|active| active.fingerprint)
    }

    pub fn install(&mut self, engine: &E, active: ActiveContext<E>) {
        if let Some(previous) = self.guard.active() {
            info!(
                "replacing context {} with {}",
                previous.fingerprint.short(),
                active.fingerprint.short()
            );
            engine.release_caches();
        } else {
            info!(
                "context {} ready (profile {})",
                active.fingerprint.short(),
                active.profile.name
            );
        }
        *self.guard = ContextState::Ready(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CkksEngine, FeatureSet};
    use crate::profiles::default_profile;
    use std::sync::Arc;
    use std::thread;

    fn active(engine: &CkksEngine, tag: u8) -> ActiveContext<CkksEngine> {
        let profile = default_profile();
        let context = engine
            .create_context(&profile, FeatureSet::standard())
            .unwrap();
        let (public_key, secret_key) = engine.keygen(&context).unwrap();
        ActiveContext {
            context,
            public_key,
            secret_key,
            fingerprint: ContextFingerprint::from_bytes([tag; 32]),
            profile,
        }
    }

    #[test]
    fn starts_uninitialized() {
        let manager = ContextManager::<CkksEngine>::new();
        assert!(!manager.is_ready());
        assert_eq!(manager.fingerprint(), None);
        assert!(manager.profile().is_none());
        assert_eq!(manager.with_ready(|_| 1), None);
    }

    #[test]
    fn first_install_keeps_caches() {
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        manager.install(&engine, active(&engine, 1));
        assert!(manager.is_ready());
        assert_eq!(engine.cached_tables(), 1);
        assert_eq!(
            manager.fingerprint(),
            Some(ContextFingerprint::from_bytes([1; 32]))
        );
    }

    #[test]
    fn replacing_releases_caches() {
        let engine = CkksEngine::new();
        let manager = ContextManager::new();
        manager.install(&engine, active(&engine, 1));
        let next = active(&engine, 2);
        assert_eq!(engine.cached_tables(), 1);
        manager.install(&engine, next);
        assert_eq!(engine.cached_tables(), 0);
        assert_eq!(
            manager.fingerprint(),
            Some(ContextFingerprint::from_bytes([2; 32]))
        );
    }

    #[test]
    fn readers_see_one_consistent_triple() {
        let engine = Arc::new(CkksEngine::new());
        let manager = Arc::new(ContextManager::<CkksEngine>::new());
        manager.install(&engine, active(&engine, 7));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    (0..50)
                        .filter_map(|_| manager.with_ready(|a| a.fingerprint))
                        .count()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 50);
        }
    }
}
