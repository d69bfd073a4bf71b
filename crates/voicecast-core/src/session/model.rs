//! Session domain model.
//!
//! This module contains the core `Session` entity — one voice-casting task
//! instance — together with the per-character `Assignment` and the immutable
//! `CharacterInfo` extracted from the screenplay.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents one voice-casting session in the application's domain layer.
///
/// A session contains:
/// - The casting document text (an opaque blob owned by the remote store)
/// - A monotonically increasing version, incremented by exactly 1 per
///   accepted commit
/// - The structured projection of the document: character-name → assignment
/// - The immutable character roster extracted from the screenplay
///
/// This is the "pure" domain model that business logic operates on,
/// independent of any specific storage format. Sessions are created by the
/// remote store and mutated only through the mutation coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Name of the screenplay this session casts voices for
    pub screenplay_name: String,
    /// The casting document text, treated as an opaque versioned blob
    pub document_text: String,
    /// Version counter, +1 per accepted commit
    pub version: u64,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
    /// Voice assignments keyed by character name
    #[serde(default)]
    pub assignments: HashMap<String, Assignment>,
    /// Character roster keyed by character name, immutable after extraction
    #[serde(default)]
    pub characters: HashMap<String, CharacterInfo>,
}

impl Session {
    /// Refreshes `updated_at` with the local clock.
    ///
    /// Speculative snapshots use this as an approximation; the canonical
    /// timestamp always comes back from the remote store.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// True when the named character has an assignment with a usable voice.
    pub fn is_cast(&self, character: &str) -> bool {
        self.assignments
            .get(character)
            .is_some_and(Assignment::has_voice_identity)
    }
}

/// A character's chosen voice plus associated casting metadata.
///
/// The voice identity is the pair (provider, voice_id). Everything else is
/// metadata that survives the voice identity being cleared: casting notes,
/// role, free-text notes, and the read-only line-count statistics carried
/// over from the screenplay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// TTS provider identifier (e.g. "openai", "elevenlabs")
    #[serde(default)]
    pub provider: String,
    /// Identifier of a voice in the provider's library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Provider-specific configuration blob, passed through opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    /// Casting direction for this character (e.g. "Warm, older")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_notes: Option<String>,
    /// Role label (e.g. "villain", "narrator")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Additional free-text notes
    #[serde(default)]
    pub additional_notes: Vec<String>,
    /// Number of dialogue lines, read-only, sourced from the screenplay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u32>,
    /// Total characters of dialogue, read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_characters: Option<u32>,
    /// Longest single dialogue length, read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest_dialogue: Option<u32>,
}

impl Assignment {
    /// True when this assignment names both a provider and a voice.
    ///
    /// A provider without a voice identifier is an assignment in progress
    /// and does not count toward casting progress.
    pub fn has_voice_identity(&self) -> bool {
        !self.provider.is_empty() && self.voice_id.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Information about a character extracted from the screenplay.
///
/// Immutable after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterInfo {
    /// Character (speaker) name; "default" for unattributed lines
    pub name: String,
    /// Number of dialogue lines
    pub line_count: u32,
    /// Total characters of dialogue
    pub total_characters: u32,
    /// Length of the longest single dialogue
    pub longest_dialogue: u32,
}

/// A partial update to an `Assignment`.
///
/// Every field is optional; `None` leaves the corresponding assignment field
/// untouched. This is the payload of `commit_assignment_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<Vec<String>>,
}

impl AssignmentPatch {
    /// Creates a patch that sets the voice identity.
    pub fn voice(provider: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            voice_id: Some(voice_id.into()),
            ..Self::default()
        }
    }

    /// Creates a patch that sets the casting notes.
    pub fn casting_notes(notes: impl Into<String>) -> Self {
        Self {
            casting_notes: Some(notes.into()),
            ..Self::default()
        }
    }

    /// Creates a patch that sets the role label.
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::default()
        }
    }

    /// Applies the patch onto an assignment, overwriting only the fields
    /// that are present. The read-only line-count statistics are never
    /// touched by a patch.
    pub fn apply_to(&self, assignment: &mut Assignment) {
        if let Some(provider) = &self.provider {
            assignment.provider = provider.clone();
        }
        if let Some(voice_id) = &self.voice_id {
            assignment.voice_id = Some(voice_id.clone());
        }
        if let Some(config) = &self.config {
            assignment.config = Some(config.clone());
        }
        if let Some(notes) = &self.casting_notes {
            assignment.casting_notes = Some(notes.clone());
        }
        if let Some(role) = &self.role {
            assignment.role = Some(role.clone());
        }
        if let Some(notes) = &self.additional_notes {
            assignment.additional_notes = notes.clone();
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_identity_requires_both_fields() {
        let mut assignment = Assignment {
            provider: "openai".to_string(),
            ..Assignment::default()
        };
        assert!(!assignment.has_voice_identity());

        assignment.voice_id = Some("alloy".to_string());
        assert!(assignment.has_voice_identity());

        assignment.provider.clear();
        assert!(!assignment.has_voice_identity());
    }

    #[test]
    fn test_empty_voice_id_is_no_identity() {
        let assignment = Assignment {
            provider: "openai".to_string(),
            voice_id: Some(String::new()),
            ..Assignment::default()
        };
        assert!(!assignment.has_voice_identity());
    }

    #[test]
    fn test_patch_preserves_unset_fields() {
        let mut assignment = Assignment {
            provider: "openai".to_string(),
            voice_id: Some("alloy".to_string()),
            casting_notes: Some("Warm, older".to_string()),
            line_count: Some(10),
            ..Assignment::default()
        };

        AssignmentPatch::role("villain").apply_to(&mut assignment);

        assert_eq!(assignment.provider, "openai");
        assert_eq!(assignment.voice_id.as_deref(), Some("alloy"));
        assert_eq!(assignment.casting_notes.as_deref(), Some("Warm, older"));
        assert_eq!(assignment.role.as_deref(), Some("villain"));
        assert_eq!(assignment.line_count, Some(10));
    }
}
