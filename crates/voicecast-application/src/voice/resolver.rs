//! Two-tier voice metadata resolution.
//!
//! Tier one is a session-scoped map of already-resolved voices; tier two is
//! the per-provider library listing, itself fetched once and cached. A miss
//! in tier one falls through to a scan of tier two and writes the result
//! back (pull-through). Total misses are never cached: the library listing
//! may still be loading upstream, so a negative answer is not durable.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use voicecast_core::error::Result;
use voicecast_core::session::{LibraryVoice, RemoteStore};

type VoiceKey = (String, String);

/// Pull-through cache for provider voice metadata.
///
/// An explicit object with a defined lifecycle: created at application
/// start, cleared on demand. Writes are idempotent and commutative —
/// concurrent identical lookups may each miss and each write through, and
/// the last write is equivalent to any other because both derive from the
/// same immutable library data.
pub struct VoiceResolutionCache {
    store: Arc<dyn RemoteStore>,
    /// Tier two: provider → full library listing
    libraries: RwLock<HashMap<String, Arc<Vec<LibraryVoice>>>>,
    /// Tier one: session → (provider, voice id) → resolved voice
    resolved: RwLock<HashMap<String, HashMap<VoiceKey, Arc<LibraryVoice>>>>,
}

impl VoiceResolutionCache {
    /// Creates an empty cache resolving through the given store.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            libraries: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a voice for a session.
    ///
    /// Returns `Ok(None)` when the provider's library has no such voice;
    /// that answer is recomputed on every call rather than cached.
    pub async fn resolve(
        &self,
        session_id: &str,
        provider: &str,
        voice_id: &str,
    ) -> Result<Option<Arc<LibraryVoice>>> {
        let key = (provider.to_string(), voice_id.to_string());
        {
            let resolved = self.resolved.read().await;
            if let Some(hit) = resolved.get(session_id).and_then(|m| m.get(&key)) {
                return Ok(Some(hit.clone()));
            }
        }

        let listing = self.library(provider).await?;
        let Some(found) = listing.iter().find(|voice| voice.id == voice_id) else {
            tracing::debug!(
                "[VoiceResolutionCache] {}/{} not in library ({} voices)",
                provider,
                voice_id,
                listing.len()
            );
            return Ok(None);
        };

        let voice = Arc::new(found.clone());
        let mut resolved = self.resolved.write().await;
        resolved
            .entry(session_id.to_string())
            .or_default()
            .insert(key, voice.clone());
        Ok(Some(voice))
    }

    /// Returns a provider's library listing, fetching it on first use.
    pub async fn library(&self, provider: &str) -> Result<Arc<Vec<LibraryVoice>>> {
        {
            let libraries = self.libraries.read().await;
            if let Some(listing) = libraries.get(provider) {
                return Ok(listing.clone());
            }
        }

        let listing = Arc::new(self.store.list_library_voices(provider).await?);
        tracing::debug!(
            "[VoiceResolutionCache] Loaded {} voices for provider {}",
            listing.len(),
            provider
        );
        let mut libraries = self.libraries.write().await;
        // A concurrent load may have raced us here; either result is derived
        // from the same immutable listing, so last write wins.
        libraries.insert(provider.to_string(), listing.clone());
        Ok(listing)
    }

    /// Searches a provider's library by free-text query and tags.
    ///
    /// The query matches case-insensitively against voice id and display
    /// name; when tags are given, a voice matches if it carries any of them.
    pub async fn search(
        &self,
        provider: &str,
        query: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<LibraryVoice>> {
        let listing = self.library(provider).await?;
        let query = query.map(str::to_lowercase);
        Ok(listing
            .iter()
            .filter(|voice| {
                if let Some(query) = &query {
                    if !voice.id.to_lowercase().contains(query)
                        && !voice.display_name.to_lowercase().contains(query)
                    {
                        return false;
                    }
                }
                if !tags.is_empty() {
                    let voice_tags: Vec<String> =
                        voice.tags.iter().map(|t| t.to_lowercase()).collect();
                    if !tags.iter().any(|t| voice_tags.contains(&t.to_lowercase())) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect())
    }

    /// Drops a provider's cached listing, forcing a refetch on next use.
    pub async fn invalidate_library(&self, provider: &str) {
        let mut libraries = self.libraries.write().await;
        libraries.remove(provider);
    }

    /// Drops all resolutions scoped to one session.
    pub async fn clear_session(&self, session_id: &str) {
        let mut resolved = self.resolved.write().await;
        resolved.remove(session_id);
    }

    /// Drops everything.
    pub async fn clear(&self) {
        self.libraries.write().await.clear();
        self.resolved.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use voicecast_core::error::CastingError;
    use voicecast_core::session::{AssignmentPatch, CharacterExtraction, Session};

    /// Store stub that only serves a voice library, counting the scans.
    struct LibraryOnlyStore {
        voices: Vec<LibraryVoice>,
        list_calls: AtomicUsize,
    }

    impl LibraryOnlyStore {
        fn new(voices: Vec<LibraryVoice>) -> Self {
            Self {
                voices,
                list_calls: AtomicUsize::new(0),
            }
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteStore for LibraryOnlyStore {
        async fn fetch_session(&self, id: &str) -> Result<Session> {
            Err(CastingError::not_found("Session", id))
        }

        async fn commit_document(&self, id: &str, _: &str, _: u64) -> Result<Session> {
            Err(CastingError::not_found("Session", id))
        }

        async fn commit_assignment_metadata(
            &self,
            id: &str,
            _: &str,
            _: &AssignmentPatch,
            _: u64,
        ) -> Result<Session> {
            Err(CastingError::not_found("Session", id))
        }

        async fn clear_assignment(&self, id: &str, _: &str, _: u64) -> Result<Session> {
            Err(CastingError::not_found("Session", id))
        }

        async fn list_library_voices(&self, _provider: &str) -> Result<Vec<LibraryVoice>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.voices.clone())
        }

        async fn extract_characters(&self, source_path: &str) -> Result<CharacterExtraction> {
            Err(CastingError::not_found("Screenplay", source_path))
        }
    }

    fn voice(id: &str, name: &str, tags: &[&str]) -> LibraryVoice {
        LibraryVoice {
            id: id.to_string(),
            display_name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_second_resolution_scans_zero_times() {
        let store = Arc::new(LibraryOnlyStore::new(vec![
            voice("alloy", "Alloy", &["neutral"]),
            voice("echo", "Echo", &["warm"]),
        ]));
        let cache = VoiceResolutionCache::new(store.clone());

        let first = cache.resolve("s-1", "openai", "echo").await.unwrap();
        assert_eq!(first.unwrap().display_name, "Echo");
        assert_eq!(store.list_calls(), 1);

        let second = cache.resolve("s-1", "openai", "echo").await.unwrap();
        assert!(second.is_some());
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_not_cached() {
        let store = Arc::new(LibraryOnlyStore::new(vec![voice("alloy", "Alloy", &[])]));
        let cache = VoiceResolutionCache::new(store.clone());

        assert!(cache.resolve("s-1", "openai", "nope").await.unwrap().is_none());
        assert!(cache.resolve("s-1", "openai", "nope").await.unwrap().is_none());
        // The listing itself is cached; only the negative answer is not.
        assert_eq!(store.list_calls(), 1);

        // After the library is refreshed, a hit resolves normally.
        cache.invalidate_library("openai").await;
        assert!(cache.resolve("s-1", "openai", "alloy").await.unwrap().is_some());
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_resolutions_are_session_scoped() {
        let store = Arc::new(LibraryOnlyStore::new(vec![voice("alloy", "Alloy", &[])]));
        let cache = VoiceResolutionCache::new(store.clone());

        cache.resolve("s-1", "openai", "alloy").await.unwrap();
        cache.clear_session("s-1").await;

        // Cleared session re-resolves from the (still cached) listing.
        assert!(cache.resolve("s-1", "openai", "alloy").await.unwrap().is_some());
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_search_filters_by_query_and_tags() {
        let store = Arc::new(LibraryOnlyStore::new(vec![
            voice("alloy", "Alloy", &["neutral"]),
            voice("echo", "Echo", &["warm", "narration"]),
            voice("fable", "Fable", &["warm"]),
        ]));
        let cache = VoiceResolutionCache::new(store);

        let warm = cache
            .search("openai", None, &["warm".to_string()])
            .await
            .unwrap();
        assert_eq!(warm.len(), 2);

        let echoes = cache.search("openai", Some("ECH"), &[]).await.unwrap();
        assert_eq!(echoes.len(), 1);
        assert_eq!(echoes[0].id, "echo");

        let none = cache
            .search("openai", Some("alloy"), &["warm".to_string()])
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
