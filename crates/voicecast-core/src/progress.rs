//! Casting progress projection.
//!
//! Pure functions over `(assignments, characters)`. Recomputed on every
//! snapshot change and never cached independently, so they can never drift
//! from the document cache.

use crate::session::{Assignment, CharacterInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How far along the casting of a session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastingProgress {
    /// Number of characters in the screenplay
    pub total_count: usize,
    /// Characters with a provider and a voice identity
    pub assigned_count: usize,
    /// `round(100 * assigned / total)`, 0 when there are no characters
    pub percent: u8,
}

/// Computes casting progress for a snapshot.
///
/// A character counts as assigned only when its assignment has a non-empty
/// provider and a voice identity; a provider chosen without a voice is still
/// in progress.
pub fn casting_progress(
    assignments: &HashMap<String, Assignment>,
    characters: &HashMap<String, CharacterInfo>,
) -> CastingProgress {
    let total_count = characters.len();
    let assigned_count = characters
        .keys()
        .filter(|name| {
            assignments
                .get(*name)
                .is_some_and(Assignment::has_voice_identity)
        })
        .count();
    let percent = if total_count == 0 {
        0
    } else {
        (100.0 * assigned_count as f64 / total_count as f64).round() as u8
    };
    CastingProgress {
        total_count,
        assigned_count,
        percent,
    }
}

/// Coverage report: which characters still need casting, and which
/// assignment keys no longer match a known character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastingReport {
    /// Known characters without a usable voice assignment, sorted
    pub unassigned: Vec<String>,
    /// Assignment keys absent from the character roster, sorted
    pub unknown: Vec<String>,
}

/// Computes the coverage report for a snapshot.
pub fn casting_report(
    assignments: &HashMap<String, Assignment>,
    characters: &HashMap<String, CharacterInfo>,
) -> CastingReport {
    let mut unassigned: Vec<String> = characters
        .keys()
        .filter(|name| {
            !assignments
                .get(*name)
                .is_some_and(Assignment::has_voice_identity)
        })
        .cloned()
        .collect();
    unassigned.sort();

    let mut unknown: Vec<String> = assignments
        .keys()
        .filter(|name| !characters.contains_key(*name))
        .cloned()
        .collect();
    unknown.sort();

    CastingReport {
        unassigned,
        unknown,
    }
}
