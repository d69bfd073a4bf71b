//! In-memory remote store.
//!
//! An authoritative store implementing the same version-arbitration
//! contract as the real backend: a commit is accepted only when the
//! caller's expected version matches the current one, and every accepted
//! commit advances the version by exactly one and stamps a canonical
//! timestamp. Used by tests and offline development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;
use voicecast_core::error::{CastingError, Result};
use voicecast_core::session::{
    AssignmentPatch, CharacterExtraction, CharacterInfo, LibraryVoice, RemoteStore, Session,
    clear_voice_identity,
};

/// A seedable, version-arbitrating session store held in memory.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    sessions: RwLock<HashMap<String, Session>>,
    voices: RwLock<HashMap<String, Vec<LibraryVoice>>>,
    extractions: RwLock<HashMap<String, Vec<CharacterInfo>>>,
    /// Error returned by the next store operation, for failure-path tests
    fail_next: Mutex<Option<CastingError>>,
}

impl InMemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session at version 1 and returns its canonical snapshot.
    pub async fn create_session(
        &self,
        screenplay_name: impl Into<String>,
        document_text: impl Into<String>,
        characters: Vec<CharacterInfo>,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            screenplay_name: screenplay_name.into(),
            document_text: document_text.into(),
            version: 1,
            updated_at: chrono::Utc::now().to_rfc3339(),
            assignments: HashMap::new(),
            characters: characters
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        };
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Inserts a fully formed session, replacing any previous one.
    pub async fn seed_session(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    /// Registers a provider's voice library listing.
    pub async fn seed_voices(&self, provider: impl Into<String>, voices: Vec<LibraryVoice>) {
        let mut map = self.voices.write().await;
        map.insert(provider.into(), voices);
    }

    /// Registers the character roster of a screenplay source file.
    pub async fn seed_extraction(
        &self,
        source_path: impl Into<String>,
        characters: Vec<CharacterInfo>,
    ) {
        let mut map = self.extractions.write().await;
        map.insert(source_path.into(), characters);
    }

    /// Makes the next store operation fail with the given error.
    pub fn fail_next(&self, err: CastingError) {
        *self.fail_next.lock().expect("fail_next lock poisoned") = Some(err);
    }

    fn take_injected_failure(&self) -> Result<()> {
        match self.fail_next.lock().expect("fail_next lock poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Arbitrates and applies one commit: version check, mutation, version
    /// bump, canonical timestamp.
    async fn commit<F>(&self, id: &str, expected_version: u64, mutate: F) -> Result<Session>
    where
        F: FnOnce(&mut Session) -> Result<()>,
    {
        self.take_injected_failure()?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| CastingError::not_found("Session", id))?;
        if session.version != expected_version {
            return Err(CastingError::version_conflict(session.version));
        }
        mutate(session)?;
        session.version += 1;
        session.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(session.clone())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn fetch_session(&self, id: &str) -> Result<Session> {
        self.take_injected_failure()?;
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| CastingError::not_found("Session", id))
    }

    async fn commit_document(
        &self,
        id: &str,
        document_text: &str,
        expected_version: u64,
    ) -> Result<Session> {
        self.commit(id, expected_version, |session| {
            session.document_text = document_text.to_string();
            Ok(())
        })
        .await
    }

    async fn commit_assignment_metadata(
        &self,
        id: &str,
        character: &str,
        patch: &AssignmentPatch,
        expected_version: u64,
    ) -> Result<Session> {
        self.commit(id, expected_version, |session| {
            if !session.characters.contains_key(character) {
                return Err(CastingError::validation([format!(
                    "unknown character '{character}'"
                )]));
            }
            let assignment = session.assignments.entry(character.to_string()).or_default();
            patch.apply_to(assignment);
            Ok(())
        })
        .await
    }

    async fn clear_assignment(
        &self,
        id: &str,
        character: &str,
        expected_version: u64,
    ) -> Result<Session> {
        self.commit(id, expected_version, |session| {
            let Some(assignment) = session.assignments.get_mut(character) else {
                return Err(CastingError::validation([format!(
                    "character '{character}' has no assignment to clear"
                )]));
            };
            clear_voice_identity(assignment);
            Ok(())
        })
        .await
    }

    async fn list_library_voices(&self, provider: &str) -> Result<Vec<LibraryVoice>> {
        self.take_injected_failure()?;
        let voices = self.voices.read().await;
        Ok(voices.get(provider).cloned().unwrap_or_default())
    }

    async fn extract_characters(&self, source_path: &str) -> Result<CharacterExtraction> {
        self.take_injected_failure()?;
        let extractions = self.extractions.read().await;
        let characters = extractions
            .get(source_path)
            .cloned()
            .ok_or_else(|| CastingError::not_found("Screenplay", source_path))?;
        Ok(CharacterExtraction::from_characters(characters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicecast_core::session::Assignment;

    fn character(name: &str, lines: u32) -> CharacterInfo {
        CharacterInfo {
            name: name.to_string(),
            line_count: lines,
            total_characters: lines * 40,
            longest_dialogue: 40,
        }
    }

    #[tokio::test]
    async fn test_commit_advances_version_by_one() {
        let store = InMemoryRemoteStore::new();
        let session = store
            .create_session("test", "", vec![character("ALICE", 10)])
            .await;

        let v2 = store
            .commit_assignment_metadata(&session.id, "ALICE", &AssignmentPatch::voice("openai", "alloy"), 1)
            .await
            .unwrap();
        assert_eq!(v2.version, 2);

        let v3 = store.commit_document(&session.id, "new text", 2).await.unwrap();
        assert_eq!(v3.version, 3);
        assert_eq!(v3.document_text, "new text");
    }

    #[tokio::test]
    async fn test_stale_commit_is_a_version_conflict() {
        let store = InMemoryRemoteStore::new();
        let session = store
            .create_session("test", "", vec![character("ALICE", 10)])
            .await;

        store.commit_document(&session.id, "first", 1).await.unwrap();

        let err = store
            .commit_document(&session.id, "second", 1)
            .await
            .unwrap_err();
        assert_eq!(err, CastingError::version_conflict(2));
    }

    #[tokio::test]
    async fn test_clear_assignment_preserves_metadata() {
        let store = InMemoryRemoteStore::new();
        let mut session = store
            .create_session("test", "", vec![character("ALICE", 10)])
            .await;
        session.assignments.insert(
            "ALICE".to_string(),
            Assignment {
                provider: "openai".to_string(),
                voice_id: Some("alloy".to_string()),
                casting_notes: Some("Warm, older".to_string()),
                role: Some("villain".to_string()),
                line_count: Some(10),
                ..Assignment::default()
            },
        );
        store.seed_session(session.clone()).await;

        let cleared = store.clear_assignment(&session.id, "ALICE", 1).await.unwrap();
        let assignment = &cleared.assignments["ALICE"];
        assert!(assignment.provider.is_empty());
        assert_eq!(assignment.voice_id, None);
        assert_eq!(assignment.casting_notes.as_deref(), Some("Warm, older"));
        assert_eq!(assignment.role.as_deref(), Some("villain"));
        assert_eq!(assignment.line_count, Some(10));
    }

    #[tokio::test]
    async fn test_unknown_character_is_a_validation_error() {
        let store = InMemoryRemoteStore::new();
        let session = store
            .create_session("test", "", vec![character("ALICE", 10)])
            .await;

        let err = store
            .commit_assignment_metadata(&session.id, "GHOST", &AssignmentPatch::role("extra"), 1)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // A rejected commit must not advance the version.
        let fetched = store.fetch_session(&session.id).await.unwrap();
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = InMemoryRemoteStore::new();
        let session = store.create_session("test", "", vec![]).await;

        store.fail_next(CastingError::network("connection reset"));
        assert!(store.fetch_session(&session.id).await.unwrap_err().is_network());
        assert!(store.fetch_session(&session.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_extraction_uses_canonical_ordering() {
        let store = InMemoryRemoteStore::new();
        store
            .seed_extraction(
                "/screenplays/test.pdf",
                vec![character("BOB", 5), character("ALICE", 10), character("default", 2)],
            )
            .await;

        let extraction = store.extract_characters("/screenplays/test.pdf").await.unwrap();
        let names: Vec<&str> = extraction.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["default", "ALICE", "BOB"]);
        assert_eq!(extraction.total_lines, 17);
    }
}
