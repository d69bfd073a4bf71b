//! Speculative session edits.
//!
//! A `SessionEdit` is the unit of work submitted to the mutation
//! coordinator. Each edit knows how to project itself onto a snapshot to
//! produce the speculative successor the UI observes immediately; the
//! matching remote commit produces the canonical result that supersedes it.

use super::model::{Assignment, AssignmentPatch, Session};
use crate::error::{CastingError, Result};

/// A single mutation of a casting session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEdit {
    /// Replace the whole casting document text.
    ///
    /// The structured assignment projection is left untouched by the
    /// speculative apply — regenerating it from the text is the remote
    /// store's job, and its canonical snapshot supersedes this one.
    ReplaceDocument { document_text: String },
    /// Apply a metadata patch to one character's assignment, creating the
    /// assignment if the character has none yet.
    PatchAssignment {
        character: String,
        patch: AssignmentPatch,
    },
    /// Remove a character's voice identity while preserving all non-voice
    /// metadata (casting notes, role, free-text notes, line statistics).
    ClearAssignment { character: String },
}

impl SessionEdit {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReplaceDocument { .. } => "replace_document",
            Self::PatchAssignment { .. } => "patch_assignment",
            Self::ClearAssignment { .. } => "clear_assignment",
        }
    }

    /// The character this edit targets, if any.
    pub fn character(&self) -> Option<&str> {
        match self {
            Self::ReplaceDocument { .. } => None,
            Self::PatchAssignment { character, .. } | Self::ClearAssignment { character } => {
                Some(character)
            }
        }
    }

    /// Computes the speculative successor snapshot.
    ///
    /// The result carries `base.version + 1` and a locally stamped
    /// `updated_at`; both are approximations that the canonical snapshot
    /// returned by the store corrects.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the edit targets a character that is not in
    /// the session's roster (assignment keys must stay a subset of known
    /// character names) or clears a character that has no assignment.
    pub fn apply(&self, base: &Session) -> Result<Session> {
        let mut next = base.clone();

        match self {
            Self::ReplaceDocument { document_text } => {
                next.document_text = document_text.clone();
            }
            Self::PatchAssignment { character, patch } => {
                if !next.characters.contains_key(character) {
                    return Err(CastingError::validation([format!(
                        "unknown character '{character}'"
                    )]));
                }
                let assignment = next.assignments.entry(character.clone()).or_default();
                patch.apply_to(assignment);
            }
            Self::ClearAssignment { character } => {
                let Some(assignment) = next.assignments.get_mut(character) else {
                    return Err(CastingError::validation([format!(
                        "character '{character}' has no assignment to clear"
                    )]));
                };
                clear_voice_identity(assignment);
            }
        }

        next.version = base.version + 1;
        next.touch();
        Ok(next)
    }
}

/// Removes the voice identity from an assignment in place, keeping every
/// non-voice field. Shared with store implementations so the speculative and
/// canonical clears agree.
pub fn clear_voice_identity(assignment: &mut Assignment) {
    assignment.provider.clear();
    assignment.voice_id = None;
    assignment.config = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CharacterInfo;
    use std::collections::HashMap;

    fn session_with(characters: &[&str]) -> Session {
        Session {
            id: "s-1".to_string(),
            screenplay_name: "test".to_string(),
            document_text: String::new(),
            version: 1,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            assignments: HashMap::new(),
            characters: characters
                .iter()
                .map(|name| {
                    (
                        name.to_string(),
                        CharacterInfo {
                            name: name.to_string(),
                            line_count: 1,
                            total_characters: 10,
                            longest_dialogue: 10,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_patch_bumps_version_by_one() {
        let base = session_with(&["ALICE"]);
        let edit = SessionEdit::PatchAssignment {
            character: "ALICE".to_string(),
            patch: AssignmentPatch::voice("openai", "alloy"),
        };

        let next = edit.apply(&base).unwrap();
        assert_eq!(next.version, 2);
        assert!(next.is_cast("ALICE"));
        // base untouched
        assert_eq!(base.version, 1);
        assert!(base.assignments.is_empty());
    }

    #[test]
    fn test_patch_unknown_character_fails_validation() {
        let base = session_with(&["ALICE"]);
        let edit = SessionEdit::PatchAssignment {
            character: "GHOST".to_string(),
            patch: AssignmentPatch::voice("openai", "alloy"),
        };

        let err = edit.apply(&base).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_clear_preserves_non_voice_metadata() {
        let mut base = session_with(&["ALICE"]);
        base.assignments.insert(
            "ALICE".to_string(),
            Assignment {
                provider: "openai".to_string(),
                voice_id: Some("alloy".to_string()),
                config: Some(serde_json::json!({"speed": 1.1})),
                casting_notes: Some("Warm, older".to_string()),
                role: Some("villain".to_string()),
                additional_notes: vec!["keep for season 2".to_string()],
                line_count: Some(10),
                total_characters: Some(431),
                longest_dialogue: Some(101),
            },
        );

        let next = SessionEdit::ClearAssignment {
            character: "ALICE".to_string(),
        }
        .apply(&base)
        .unwrap();

        let cleared = &next.assignments["ALICE"];
        assert!(cleared.provider.is_empty());
        assert_eq!(cleared.voice_id, None);
        assert_eq!(cleared.config, None);
        assert_eq!(cleared.casting_notes.as_deref(), Some("Warm, older"));
        assert_eq!(cleared.role.as_deref(), Some("villain"));
        assert_eq!(cleared.additional_notes, vec!["keep for season 2"]);
        assert_eq!(cleared.line_count, Some(10));
    }

    #[test]
    fn test_clear_without_assignment_fails_validation() {
        let base = session_with(&["ALICE"]);
        let err = SessionEdit::ClearAssignment {
            character: "ALICE".to_string(),
        }
        .apply(&base)
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_replace_document_keeps_projection() {
        let mut base = session_with(&["ALICE"]);
        base.assignments
            .insert("ALICE".to_string(), Assignment::default());

        let next = SessionEdit::ReplaceDocument {
            document_text: "ALICE:\n  provider: openai".to_string(),
        }
        .apply(&base)
        .unwrap();

        assert_eq!(next.document_text, "ALICE:\n  provider: openai");
        assert_eq!(next.assignments.len(), 1);
        assert_eq!(next.version, 2);
    }
}
