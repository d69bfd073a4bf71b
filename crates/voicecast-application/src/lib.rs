//! VoiceCast application layer.
//!
//! Orchestrates the session synchronization core: the document cache, the
//! optimistic mutation coordinator and the voice resolution cache, plus the
//! `CastingSessionService` facade that ties them together for consumers.

pub mod session;
pub mod voice;

pub use session::{CastingSessionService, DocumentCache, MutationCoordinator, SyncPhase};
pub use voice::VoiceResolutionCache;
