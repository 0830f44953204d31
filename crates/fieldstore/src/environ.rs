//! Explicit context shared by every field store entry point.

use crate::ident::IdentCodec;
use crate::index::TemporalIndex;
use crate::layout::DirectoryResolver;
use crate::lock::{LockConfig, LockManager};
use crate::metafile::{ContentIndex, MetafileResolver, NameIndex};
use crate::registry::{FieldId, Registry};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Files in a map directory and the fields each one holds.
pub type MapIndex = Arc<Vec<(String, Vec<FieldId>)>>;

/// Process-local state for one view of the data tree.
///
/// Owns the registry, the lock policy, the content index used to confirm
/// field membership, and the caches that would otherwise be global: the
/// set of names whose missing-identifier diagnostic was already emitted, and
/// the per-directory map file index. Independent instances never share
/// state, so tests can run several side by side.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::{Environ, Registry};
///
/// let registry = Registry::from_toml_str(&text)?;
/// let env = Environ::new(registry);
/// let dir = env.resolver().source_directory_by_name("GEM", "", Some("1991:238:12"))?;
/// ```
pub struct Environ {
    registry: Arc<Registry>,
    locks: LockManager,
    content_index: Box<dyn ContentIndex>,
    reported: RwLock<HashSet<String>>,
    map_indexes: RwLock<HashMap<PathBuf, MapIndex>>,
}

impl Environ {
    /// Creates a context with the default lock policy and a file-name based
    /// content index.
    pub fn new(registry: Registry) -> Self {
        Self::with_shared_registry(Arc::new(registry))
    }

    /// Creates a context over a registry shared with other contexts.
    pub fn with_shared_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            locks: LockManager::default(),
            content_index: Box::new(NameIndex),
            reported: RwLock::new(HashSet::new()),
            map_indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the lock timing policy.
    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.locks = LockManager::new(config);
        self
    }

    /// Replaces the content index.
    pub fn with_content_index(mut self, index: impl ContentIndex + 'static) -> Self {
        self.content_index = Box::new(index);
        self
    }

    /// Configuration registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lock manager.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Content index used to confirm field membership.
    pub fn content_index(&self) -> &dyn ContentIndex {
        self.content_index.as_ref()
    }

    /// File and link identifier codec.
    pub fn codec(&self) -> IdentCodec<'_> {
        IdentCodec::new(self)
    }

    /// Source directory resolver.
    pub fn resolver(&self) -> DirectoryResolver<'_> {
        DirectoryResolver::new(self)
    }

    /// Valid-time index.
    pub fn index(&self) -> TemporalIndex<'_> {
        TemporalIndex::new(self)
    }

    /// Metafile path resolver.
    pub fn metafiles(&self) -> MetafileResolver<'_> {
        MetafileResolver::new(self)
    }

    /// Records a diagnostic key. Returns true the first time a key is seen.
    pub(crate) fn first_report(&self, key: String) -> bool {
        let mut reported = self.reported.write().unwrap_or_else(|err| err.into_inner());
        reported.insert(key)
    }

    pub(crate) fn map_index(&self, dir: &Path) -> Option<MapIndex> {
        let indexes = self.map_indexes.read().unwrap_or_else(|err| err.into_inner());
        indexes.get(dir).cloned()
    }

    pub(crate) fn store_map_index(&self, dir: &Path, index: MapIndex) {
        debug!("Indexed {} map files in {}", index.len(), dir.display());
        let mut indexes = self.map_indexes.write().unwrap_or_else(|err| err.into_inner());
        indexes.insert(dir.to_path_buf(), index);
    }

    /// Drops cached map indexes and diagnostic history.
    pub fn clear_caches(&self) {
        self.map_indexes
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
        self.reported
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }
}

impl std::fmt::Debug for Environ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environ")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
