//! VoiceCast infrastructure layer.
//!
//! Concrete adapters behind the core's `RemoteStore` boundary — the HTTP
//! client for the studio backend and an in-memory store with the same
//! version-arbitration contract — plus configuration and path management.

pub mod config;
pub mod http_store;
pub mod memory_store;
pub mod paths;

pub use config::{ConfigService, StudioConfig};
pub use http_store::HttpRemoteStore;
pub use memory_store::InMemoryRemoteStore;
pub use paths::StudioPaths;
