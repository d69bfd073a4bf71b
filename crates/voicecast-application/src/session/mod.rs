//! Session synchronization components.
//!
//! - `cache`: the document cache every reader consumes
//! - `coordinator`: optimistic mutations, versioned commits, rollback
//! - `service`: the use case facade a shell binds to

mod cache;
mod coordinator;
mod service;

pub use cache::DocumentCache;
pub use coordinator::{MutationCoordinator, SyncPhase};
pub use service::CastingSessionService;
