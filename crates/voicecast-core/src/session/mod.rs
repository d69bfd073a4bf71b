//! Session domain module.
//!
//! This module contains all session-related domain models, the speculative
//! edit transform, and the remote store contract.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `Assignment`,
//!   `CharacterInfo`, `AssignmentPatch`)
//! - `edit`: Speculative mutations (`SessionEdit`)
//! - `store`: Remote store contract (`RemoteStore`) and its wire types

mod edit;
mod model;
mod store;

// Re-export public API
pub use edit::{SessionEdit, clear_voice_identity};
pub use model::{Assignment, AssignmentPatch, CharacterInfo, Session};
pub use store::{CharacterExtraction, LibraryVoice, RemoteStore};
