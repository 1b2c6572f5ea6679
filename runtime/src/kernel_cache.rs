//! Kernel cache.
//!
//! Maps artifact identifiers to loaded kernel handles. Each artifact is loaded at most once while it stays
//! cached; with [`RetentionPolicy::Unbounded`] nothing is ever evicted, so memory grows with the number of
//! distinct artifacts used.
//!
//! The cache also remembers the identifier (and handle) of the last call. Repeated calls for the same artifact
//! skip the map lookup entirely.
//!
//! # Thread Safety
//!
//! The cache itself is not synchronized; [`crate::BackendVariant`] keeps it behind a mutex. Handles are shared
//! (`Arc<Mutex<_>>`) so an evicted handle that is still executing stays alive until its call finishes.

use std::collections::HashMap;
use std::sync::Arc;

use aotcall_device::{Kernel, NdArray};
use parking_lot::Mutex;
use snafu::ResultExt;

use crate::config::RetentionPolicy;
use crate::envelope::ArtifactId;
use crate::error::{LoadSnafu, Result};
use crate::invoker::InvocationState;

/// A loaded kernel plus its bound-argument state.
pub struct KernelHandle<K> {
    pub(crate) artifact: ArtifactId,
    pub(crate) kernel: K,
    pub(crate) args: Vec<NdArray>,
    pub(crate) state: InvocationState,
}

impl<K: Kernel> KernelHandle<K> {
    pub fn new(artifact: ArtifactId, kernel: K) -> Self {
        Self { artifact, kernel, args: Vec::new(), state: InvocationState::Ready }
    }

    pub fn artifact(&self) -> &ArtifactId {
        &self.artifact
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Arguments bound for the next launch, in positional order.
    pub fn args(&self) -> &[NdArray] {
        &self.args
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Drop every bound argument.
    pub fn clear_args(&mut self) {
        self.args.clear();
    }
}

/// A cached handle, locked for the whole bind/launch/wait cycle.
pub type SharedHandle<K> = Arc<Mutex<KernelHandle<K>>>;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Handles currently cached.
    pub entries: usize,
    /// Artifacts loaded from disk.
    pub loads: u64,
    /// Map lookups that found a cached handle.
    pub hits: u64,
    /// Calls served from the current-identifier slot.
    pub fast_path: u64,
    /// Handles dropped by the retention policy.
    pub evictions: u64,
}

struct CacheEntry<K> {
    handle: SharedHandle<K>,
    last_used: u64,
}

/// Artifact identifier to kernel handle mapping with a current-identifier fast path.
pub struct KernelCache<K> {
    entries: HashMap<ArtifactId, CacheEntry<K>>,
    current: Option<(ArtifactId, SharedHandle<K>)>,
    retention: RetentionPolicy,
    tick: u64,
    stats: CacheStats,
}

impl<K: Kernel> KernelCache<K> {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self { entries: HashMap::new(), current: None, retention, tick: 0, stats: CacheStats::default() }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Handle for `id`, loading it with `load_fn` if it is not cached.
    ///
    /// A cached handle is returned unchanged. Load failures are not cached.
    pub fn get_or_load<F>(&mut self, id: &ArtifactId, load_fn: F) -> Result<SharedHandle<K>>
    where
        F: FnOnce(&ArtifactId) -> aotcall_device::Result<K>,
    {
        self.tick += 1;

        // Fast path: already loaded
        if let Some(entry) = self.entries.get_mut(id) {
            entry.last_used = self.tick;
            self.stats.hits += 1;
            tracing::debug!(artifact = %id, "Kernel cache hit");
            return Ok(Arc::clone(&entry.handle));
        }

        // Slow path: load the artifact
        let kernel = load_fn(id).context(LoadSnafu { artifact: id.to_string() })?;
        self.stats.loads += 1;
        tracing::debug!(artifact = %id, kernel.name = %kernel.name(), "Kernel cache miss, artifact loaded");

        if let Some(capacity) = self.retention.capacity() {
            while self.entries.len() >= capacity {
                self.evict_lru();
            }
        }

        let handle = Arc::new(Mutex::new(KernelHandle::new(id.clone(), kernel)));
        self.entries.insert(id.clone(), CacheEntry { handle: Arc::clone(&handle), last_used: self.tick });
        Ok(handle)
    }

    /// Per-call entry point: reuse the current handle when `id` matches, otherwise [`Self::get_or_load`] and make
    /// `id` current.
    pub fn load<F>(&mut self, id: &ArtifactId, load_fn: F) -> Result<SharedHandle<K>>
    where
        F: FnOnce(&ArtifactId) -> aotcall_device::Result<K>,
    {
        if let Some((current, handle)) = &self.current
            && current == id
        {
            self.stats.fast_path += 1;
            return Ok(Arc::clone(handle));
        }

        let handle = self.get_or_load(id, load_fn)?;
        self.current = Some((id.clone(), Arc::clone(&handle)));
        Ok(handle)
    }

    /// Drop the least recently used entry.
    ///
    /// The current handle always carries the newest tick, so it only goes when it is the last entry.
    fn evict_lru(&mut self) {
        let Some(victim) = self.entries.iter().min_by_key(|(_, entry)| entry.last_used).map(|(id, _)| id.clone())
        else {
            return;
        };
        self.entries.remove(&victim);
        if self.current.as_ref().is_some_and(|(current, _)| *current == victim) {
            self.current = None;
        }
        self.stats.evictions += 1;
        tracing::debug!(artifact = %victim, "Kernel evicted from cache");
    }

    /// Drop every handle and forget the current identifier.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<&ArtifactId> {
        self.current.as_ref().map(|(id, _)| id)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { entries: self.entries.len(), ..self.stats }
    }
}

impl<K: Kernel> Default for KernelCache<K> {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}
