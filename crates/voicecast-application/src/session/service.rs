//! Casting session use case.
//!
//! This module provides the `CastingSessionService` which wires the
//! document cache, the mutation coordinator and the voice resolution cache
//! into the surface a shell binds to. All snapshots it hands out come from
//! the document cache; all mutations go through the coordinator.

use std::sync::Arc;
use voicecast_core::error::{CastingError, Result};
use voicecast_core::progress::{CastingProgress, CastingReport, casting_progress, casting_report};
use voicecast_core::session::{
    AssignmentPatch, CharacterExtraction, LibraryVoice, RemoteStore, Session, SessionEdit,
};

use super::cache::DocumentCache;
use super::coordinator::MutationCoordinator;
use crate::voice::VoiceResolutionCache;

/// Use case facade for voice-casting sessions.
///
/// Owns the caches (created at application start, cleared on demand) and
/// exposes typed edit helpers over [`MutationCoordinator::submit`]. Derived
/// state is recomputed from the cached snapshot on every call, never stored.
pub struct CastingSessionService {
    store: Arc<dyn RemoteStore>,
    cache: Arc<DocumentCache>,
    coordinator: Arc<MutationCoordinator>,
    voices: Arc<VoiceResolutionCache>,
}

impl CastingSessionService {
    /// Creates the service with fresh caches over the given store.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let cache = Arc::new(DocumentCache::new());
        let coordinator = Arc::new(MutationCoordinator::new(cache.clone(), store.clone()));
        let voices = Arc::new(VoiceResolutionCache::new(store.clone()));
        Self {
            store,
            cache,
            coordinator,
            voices,
        }
    }

    /// The mutation coordinator, for callers that submit raw edits.
    pub fn coordinator(&self) -> Arc<MutationCoordinator> {
        self.coordinator.clone()
    }

    /// The shared document cache (read-only for everyone but the coordinator).
    pub fn cache(&self) -> Arc<DocumentCache> {
        self.cache.clone()
    }

    /// The voice resolution cache.
    pub fn voices(&self) -> Arc<VoiceResolutionCache> {
        self.voices.clone()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Opens a session, fetching it lazily on first access.
    pub async fn open_session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.coordinator.open_session(session_id).await
    }

    /// The cached snapshot, if present and fresh.
    pub async fn session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.cache.get(session_id).await
    }

    /// Forces a refetch; see [`MutationCoordinator::refresh`].
    pub async fn refresh(&self, session_id: &str) -> Result<Option<Arc<Session>>> {
        self.coordinator.refresh(session_id).await
    }

    /// Casting progress for the cached snapshot.
    pub async fn progress(&self, session_id: &str) -> Result<CastingProgress> {
        let snapshot = self.snapshot(session_id).await?;
        Ok(casting_progress(&snapshot.assignments, &snapshot.characters))
    }

    /// Casting coverage report for the cached snapshot.
    pub async fn report(&self, session_id: &str) -> Result<CastingReport> {
        let snapshot = self.snapshot(session_id).await?;
        Ok(casting_report(&snapshot.assignments, &snapshot.characters))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Assigns a library voice to a character.
    pub async fn assign_voice(
        &self,
        session_id: &str,
        character: &str,
        provider: &str,
        voice_id: &str,
    ) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::PatchAssignment {
                    character: character.to_string(),
                    patch: AssignmentPatch::voice(provider, voice_id),
                },
            )
            .await
    }

    /// Updates a character's casting notes.
    pub async fn set_casting_notes(
        &self,
        session_id: &str,
        character: &str,
        notes: impl Into<String>,
    ) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::PatchAssignment {
                    character: character.to_string(),
                    patch: AssignmentPatch::casting_notes(notes.into()),
                },
            )
            .await
    }

    /// Updates a character's role label.
    pub async fn set_role(
        &self,
        session_id: &str,
        character: &str,
        role: impl Into<String>,
    ) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::PatchAssignment {
                    character: character.to_string(),
                    patch: AssignmentPatch::role(role.into()),
                },
            )
            .await
    }

    /// Applies an arbitrary metadata patch to a character's assignment.
    pub async fn patch_assignment(
        &self,
        session_id: &str,
        character: &str,
        patch: AssignmentPatch,
    ) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::PatchAssignment {
                    character: character.to_string(),
                    patch,
                },
            )
            .await
    }

    /// Removes a character's voice identity, keeping its metadata.
    pub async fn clear_voice(&self, session_id: &str, character: &str) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::ClearAssignment {
                    character: character.to_string(),
                },
            )
            .await
    }

    /// Replaces the whole casting document text.
    pub async fn replace_document(
        &self,
        session_id: &str,
        document_text: impl Into<String>,
    ) -> Result<Arc<Session>> {
        self.coordinator
            .submit(
                session_id,
                SessionEdit::ReplaceDocument {
                    document_text: document_text.into(),
                },
            )
            .await
    }

    /// Cancels in-flight work for a session (navigate-away).
    pub async fn leave_session(&self, session_id: &str) {
        self.coordinator.cancel(session_id).await;
    }

    // ========================================================================
    // Voice metadata
    // ========================================================================

    /// Resolves a voice for a session through the two-tier cache.
    pub async fn resolve_voice(
        &self,
        session_id: &str,
        provider: &str,
        voice_id: &str,
    ) -> Result<Option<Arc<LibraryVoice>>> {
        self.voices.resolve(session_id, provider, voice_id).await
    }

    /// Searches a provider's voice library.
    pub async fn search_voices(
        &self,
        provider: &str,
        query: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<LibraryVoice>> {
        self.voices.search(provider, query, tags).await
    }

    /// Extracts the character roster from a screenplay source file.
    pub async fn extract_characters(&self, source_path: &str) -> Result<CharacterExtraction> {
        self.store.extract_characters(source_path).await
    }

    /// Clears every cache this service owns.
    pub async fn clear_caches(&self) {
        self.cache.clear().await;
        self.voices.clear().await;
    }

    async fn snapshot(&self, session_id: &str) -> Result<Arc<Session>> {
        self.cache
            .get(session_id)
            .await
            .ok_or_else(|| CastingError::not_found("Session", session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicecast_core::session::CharacterInfo;
    use voicecast_infrastructure::InMemoryRemoteStore;

    fn character(name: &str, lines: u32) -> CharacterInfo {
        CharacterInfo {
            name: name.to_string(),
            line_count: lines,
            total_characters: lines * 40,
            longest_dialogue: 40,
        }
    }

    #[tokio::test]
    async fn test_casting_flow_end_to_end() {
        let store = Arc::new(InMemoryRemoteStore::new());
        store
            .seed_voices(
                "openai",
                vec![LibraryVoice {
                    id: "alloy".to_string(),
                    display_name: "Alloy".to_string(),
                    tags: vec!["neutral".to_string()],
                }],
            )
            .await;
        let session = store
            .create_session("pulp", "", vec![character("ALICE", 10), character("BOB", 5)])
            .await;
        let service = CastingSessionService::new(store.clone());

        service.open_session(&session.id).await.unwrap();
        let progress = service.progress(&session.id).await.unwrap();
        assert_eq!(progress.total_count, 2);
        assert_eq!(progress.assigned_count, 0);
        assert_eq!(progress.percent, 0);

        service
            .assign_voice(&session.id, "ALICE", "openai", "alloy")
            .await
            .unwrap();
        let progress = service.progress(&session.id).await.unwrap();
        assert_eq!(progress.assigned_count, 1);
        assert_eq!(progress.percent, 50);

        let resolved = service
            .resolve_voice(&session.id, "openai", "alloy")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.display_name, "Alloy");

        service
            .set_casting_notes(&session.id, "ALICE", "Warm, older")
            .await
            .unwrap();
        service.set_role(&session.id, "ALICE", "villain").await.unwrap();

        // Clearing the voice keeps the metadata and drops the progress.
        let cleared = service.clear_voice(&session.id, "ALICE").await.unwrap();
        assert_eq!(cleared.version, 5);
        let assignment = &cleared.assignments["ALICE"];
        assert!(assignment.provider.is_empty());
        assert_eq!(assignment.voice_id, None);
        assert_eq!(assignment.casting_notes.as_deref(), Some("Warm, older"));
        assert_eq!(assignment.role.as_deref(), Some("villain"));

        let progress = service.progress(&session.id).await.unwrap();
        assert_eq!(progress.assigned_count, 0);

        let report = service.report(&session.id).await.unwrap();
        assert_eq!(report.unassigned, vec!["ALICE", "BOB"]);
        assert!(report.unknown.is_empty());
    }

    #[tokio::test]
    async fn test_derived_state_requires_cached_snapshot() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let service = CastingSessionService::new(store);

        let err = service.progress("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
