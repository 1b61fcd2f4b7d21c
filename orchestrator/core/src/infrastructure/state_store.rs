// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # File-backed State Store
//!
//! Holds the single [`StateDocument`] as pretty-printed JSON on local disk.
//!
//! - Every read goes back to disk so out-of-band edits and corruption are
//!   noticed. A missing or unparseable file is replaced by a fresh document
//!   (revision 0) and persisted.
//! - [`StateStore::mutate`] runs read-transform-commit-persist under one
//!   exclusive guard, so concurrent mutations serialize and each bumps the
//!   revision exactly once.
//! - [`StateStore::exclusive`] hands that guard to the caller, so work that
//!   must follow the commit order (the routing artifact) can run before it
//!   is released.
//! - Persistence writes a sibling temp file, syncs it, then renames it over
//!   the target. A crash mid-write leaves either the old or the new document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::domain::state::{now, StateDocument, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("failed to read state from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist state to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct StateStore {
    path: PathBuf,
    guard: RwLock<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: RwLock::new(()),
        }
    }

    /// Create the store and make sure a valid document exists on disk
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateStoreError> {
        let store = Self::new(path);
        let doc = store.read()?;
        debug!(path = %store.path.display(), revision = doc.revision(), "State store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current committed document
    pub fn read(&self) -> Result<StateDocument, StateStoreError> {
        {
            let _shared = self.guard.read();
            if let Some(doc) = self.load()? {
                return Ok(doc);
            }
        }

        // Missing or corrupt: repair under the exclusive guard. Another
        // caller may have repaired it in between, so load() runs again.
        let _exclusive = self.guard.write();
        self.load_or_repair()
    }

    /// Hold the exclusive guard until the returned section is dropped.
    ///
    /// Calling any other method of this store while holding it deadlocks.
    pub fn exclusive(&self) -> ExclusiveSection<'_> {
        ExclusiveSection {
            store: self,
            _guard: self.guard.write(),
        }
    }

    /// Apply `transform` to the current document and commit the result.
    ///
    /// The transform receives the commit timestamp. On success the revision
    /// has advanced by one and the returned snapshot is what is on disk.
    /// On a persistence error the on-disk document is left untouched.
    pub fn mutate<R, F>(&self, transform: F) -> Result<(StateDocument, R), StateStoreError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> R,
    {
        self.exclusive().mutate(transform)
    }

    /// Like [`StateStore::mutate`], but a transform returning `None` leaves
    /// the document uncommitted: no revision bump, nothing written.
    pub fn mutate_if<R, F>(&self, transform: F) -> Result<Option<(StateDocument, R)>, StateStoreError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> Option<R>,
    {
        self.exclusive().mutate_if(transform)
    }

    // Callers must hold the exclusive guard.
    fn load_or_repair(&self) -> Result<StateDocument, StateStoreError> {
        if let Some(doc) = self.load()? {
            return Ok(doc);
        }
        let fresh = StateDocument::empty(now());
        self.persist(&fresh)?;
        Ok(fresh)
    }

    fn load(&self) -> Result<Option<StateDocument>, StateStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "State file missing, initializing");
                return Ok(None);
            }
            Err(source) => {
                return Err(StateStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str::<StateDocument>(&content) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file is corrupt, replacing with a fresh document"
                );
                Ok(None)
            }
        }
    }

    fn persist(&self, doc: &StateDocument) -> Result<(), StateStoreError> {
        let body = serde_json::to_string_pretty(doc)?;
        write_atomic(&self.path, body.as_bytes()).map_err(|source| StateStoreError::Persistence {
            path: self.path.clone(),
            source,
        })
    }
}

/// A held exclusive guard on a [`StateStore`]
pub struct ExclusiveSection<'a> {
    store: &'a StateStore,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl ExclusiveSection<'_> {
    /// Current committed document, repaired if missing or corrupt
    pub fn current(&self) -> Result<StateDocument, StateStoreError> {
        self.store.load_or_repair()
    }

    pub fn mutate<R, F>(&self, transform: F) -> Result<(StateDocument, R), StateStoreError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> R,
    {
        let mut doc = self.store.load_or_repair()?;
        let at = now();
        let output = transform(&mut doc, at);
        doc.commit(at);
        self.store.persist(&doc)?;

        debug!(revision = doc.revision(), "State committed");
        Ok((doc, output))
    }

    pub fn mutate_if<R, F>(&self, transform: F) -> Result<Option<(StateDocument, R)>, StateStoreError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> Option<R>,
    {
        let mut doc = self.store.load_or_repair()?;
        let at = now();
        let Some(output) = transform(&mut doc, at) else {
            return Ok(None);
        };
        doc.commit(at);
        self.store.persist(&doc)?;

        debug!(revision = doc.revision(), "State committed");
        Ok(Some((doc, output)))
    }
}

/// Write `contents` to a sibling temp file and rename it over `path`
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// `<file name>.tmp` next to `path`, keeping the original extension
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::StorageStatus;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("runtime").join("state.json"))
    }

    #[test]
    fn test_fresh_store_initializes_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let doc = store.read().unwrap();
        assert_eq!(doc.revision(), 0);
        assert!(doc.domains.is_empty());
        assert!(doc.agents.is_empty());
        assert_eq!(doc.meta.storage_status, StorageStatus::Uninitialized);
        assert!(store.path().exists());
    }

    #[test]
    fn test_mutate_bumps_revision_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let (first, _) = store.mutate(|_, _| ()).unwrap();
        assert_eq!(first.revision(), 1);
        let (second, value) = store.mutate(|_, _| 42).unwrap();
        assert_eq!(second.revision(), 2);
        assert_eq!(value, 42);

        let reopened = StateStore::open(store.path().to_path_buf()).unwrap();
        assert_eq!(reopened.read().unwrap().revision(), 2);
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.mutate(|_, _| ()).unwrap();

        fs::write(store.path(), "{ not json").unwrap();

        let doc = store.read().unwrap();
        assert_eq!(doc.revision(), 0);
        let on_disk: StateDocument =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk.revision(), 0);
    }

    #[test]
    fn test_persistence_failure_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.mutate(|_, _| ()).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir_all(temp_path(store.path())).unwrap();

        let result = store.mutate(|_, _| ());
        assert!(matches!(result, Err(StateStoreError::Persistence { .. })));
        assert_eq!(store.read().unwrap().revision(), 1);
    }

    #[test]
    fn test_mutate_if_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.mutate(|_, _| ()).unwrap();

        let skipped = store.mutate_if(|_, _| None::<()>).unwrap();
        assert!(skipped.is_none());
        assert_eq!(store.read().unwrap().revision(), 1);

        let (doc, _) = store.mutate_if(|_, _| Some(())).unwrap().unwrap();
        assert_eq!(doc.revision(), 2);
    }

    #[test]
    fn test_concurrent_mutations_serialize() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.mutate(|_, _| ()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read().unwrap().revision(), 40);
    }

    #[test]
    fn test_exclusive_section_sees_its_own_commits() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        {
            let section = store.exclusive();
            let (doc, _) = section.mutate(|_, _| ()).unwrap();
            assert_eq!(doc.revision(), 1);
            assert!(section.mutate_if(|_, _| None::<()>).unwrap().is_none());
            assert_eq!(section.current().unwrap().revision(), 1);
        }

        assert_eq!(store.read().unwrap().revision(), 1);
    }

    #[test]
    fn test_same_stem_files_use_distinct_temp_paths() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("dynamic").join("domains.json");
        let routes = dir.path().join("dynamic").join("domains.yml");

        assert_eq!(temp_path(&state), dir.path().join("dynamic").join("domains.json.tmp"));
        assert_ne!(temp_path(&state), temp_path(&routes));

        // the routing file's temp path is taken; the state write still lands
        fs::create_dir_all(temp_path(&routes)).unwrap();
        write_atomic(&state, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&state).unwrap(), "{}");
        assert!(!temp_path(&state).exists());
    }
}
