//! Remote store contract.
//!
//! The remote store is the authoritative owner of casting sessions: it
//! performs true persistence, parses and regenerates the casting document,
//! and arbitrates versions. The core consumes it through this trait and
//! never interprets the document itself.

use super::model::{AssignmentPatch, CharacterInfo, Session};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A voice cataloged in a provider's pre-built roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryVoice {
    /// Library-wide voice identifier
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Descriptive tags ("warm", "narration", ...)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of extracting the character roster from a screenplay source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterExtraction {
    /// Characters ordered "default" first, then by line count descending,
    /// then by name
    pub characters: Vec<CharacterInfo>,
    /// Sum of all line counts
    pub total_lines: u32,
    /// Line count attributed to the "default" (unattributed) speaker
    pub default_lines: u32,
}

impl CharacterExtraction {
    /// Builds an extraction result from an unordered character list,
    /// applying the canonical ordering and computing the totals.
    pub fn from_characters(mut characters: Vec<CharacterInfo>) -> Self {
        characters.sort_by(|a, b| {
            (a.name != "default", std::cmp::Reverse(a.line_count), &a.name).cmp(&(
                b.name != "default",
                std::cmp::Reverse(b.line_count),
                &b.name,
            ))
        });
        let total_lines = characters.iter().map(|c| c.line_count).sum();
        let default_lines = characters
            .iter()
            .find(|c| c.name == "default")
            .map(|c| c.line_count)
            .unwrap_or(0);
        Self {
            characters,
            total_lines,
            default_lines,
        }
    }
}

/// An abstract adapter to the authoritative session store.
///
/// All commit operations use optimistic concurrency: they carry the version
/// the caller last observed, and fail with `VersionConflict` when the store
/// has moved past it. Accepted commits return the canonical snapshot — the
/// caller must adopt it rather than keep its own speculative result, since
/// canonicalization may correct fields (exact timestamps, normalized
/// projections) the local transform only approximated.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches a session by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the id is unknown
    /// - `Parse` when the stored document cannot be projected
    async fn fetch_session(&self, id: &str) -> Result<Session>;

    /// Replaces the casting document text.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` when `expected_version` is stale
    /// - `Validation` when the new document is rejected
    async fn commit_document(
        &self,
        id: &str,
        document_text: &str,
        expected_version: u64,
    ) -> Result<Session>;

    /// Applies a metadata patch to one character's assignment.
    ///
    /// # Errors
    ///
    /// Same failure kinds as [`RemoteStore::commit_document`].
    async fn commit_assignment_metadata(
        &self,
        id: &str,
        character: &str,
        patch: &AssignmentPatch,
        expected_version: u64,
    ) -> Result<Session>;

    /// Removes a character's voice identity.
    ///
    /// The store must preserve all non-voice metadata (casting notes, role,
    /// free-text notes, line-count statistics); the client never
    /// reconstructs removed metadata itself.
    async fn clear_assignment(
        &self,
        id: &str,
        character: &str,
        expected_version: u64,
    ) -> Result<Session>;

    /// Lists a provider's library voices as one finite ordered sequence,
    /// regardless of any underlying pagination.
    async fn list_library_voices(&self, provider: &str) -> Result<Vec<LibraryVoice>>;

    /// Extracts the character roster from a screenplay source file.
    async fn extract_characters(&self, source_path: &str) -> Result<CharacterExtraction>;
}
