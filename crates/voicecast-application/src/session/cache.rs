//! In-memory cache of session snapshots.
//!
//! The document cache is the single source every reader consumes: UI
//! consumers and the derived-state projection only ever see snapshots
//! published here. Replacement is a whole-`Arc` swap under a write lock, so
//! a reader can never observe a half-applied snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use voicecast_core::session::Session;

struct CacheEntry {
    snapshot: Arc<Session>,
    stale: bool,
}

/// Keyed store of session snapshots with atomic replacement.
///
/// Only the mutation coordinator writes here; everything else reads. Two
/// write paths exist on purpose:
///
/// - [`DocumentCache::publish`] replaces unconditionally and is used for
///   speculative snapshots and rollbacks (a rollback legitimately lowers
///   the version).
/// - [`DocumentCache::admit`] is for fetched and canonical snapshots and
///   discards anything that would regress the version for a session.
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DocumentCache {
    /// Creates a new empty DocumentCache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Gets the cached snapshot for a session.
    ///
    /// Returns `None` when the session is absent or has been invalidated,
    /// forcing the caller down the refetch path.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .filter(|entry| !entry.stale)
            .map(|entry| entry.snapshot.clone())
    }

    /// Gets the cached snapshot even when it is marked stale.
    ///
    /// Used for degraded reads when the authoritative fetch fails.
    pub async fn peek(&self, session_id: &str) -> Option<Arc<Session>> {
        let entries = self.entries.read().await;
        entries.get(session_id).map(|entry| entry.snapshot.clone())
    }

    /// Replaces the snapshot for a session unconditionally.
    ///
    /// Coordinator-only write path for speculative snapshots and rollbacks;
    /// it performs no version check.
    pub async fn publish(&self, session_id: &str, snapshot: Arc<Session>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            session_id.to_string(),
            CacheEntry {
                snapshot,
                stale: false,
            },
        );
    }

    /// Admits a fetched or canonical snapshot.
    ///
    /// The snapshot is discarded (and `false` returned) when its version is
    /// lower than the currently cached version for that session — the cache
    /// never regresses on admitted data, so an out-of-order response cannot
    /// clobber newer state.
    pub async fn admit(&self, session_id: &str, snapshot: Arc<Session>) -> bool {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(session_id) {
            if snapshot.version < existing.snapshot.version {
                tracing::warn!(
                    "[DocumentCache] Discarding version-regressing snapshot for {}: {} < {}",
                    session_id,
                    snapshot.version,
                    existing.snapshot.version
                );
                return false;
            }
        }
        entries.insert(
            session_id.to_string(),
            CacheEntry {
                snapshot,
                stale: false,
            },
        );
        true
    }

    /// Marks a session's snapshot stale, forcing a refetch on next access.
    ///
    /// The snapshot itself is retained so degraded reads and version checks
    /// keep working.
    pub async fn invalidate(&self, session_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(session_id) {
            entry.stale = true;
        }
    }

    /// Removes a session from the cache.
    pub async fn remove(&self, session_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(session_id);
    }

    /// Clears all cached sessions.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}
