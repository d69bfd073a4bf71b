//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the studio configuration
//! from the configuration file (~/.config/voicecast/config.toml).

use crate::paths::StudioPaths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use voicecast_core::error::Result;

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Studio-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Base URL of the authoritative session backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Per-request timeout for backend calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Configuration service that loads and caches the studio configuration.
///
/// The configuration is read from config.toml on first access and cached to
/// avoid repeated file I/O.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    /// Cached configuration loaded from file.
    /// Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<StudioConfig>>>,
}

impl ConfigService {
    /// Creates a new ConfigService.
    ///
    /// The configuration is loaded lazily on first access to avoid blocking
    /// during initialization.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the studio configuration, loading from file if not cached.
    ///
    /// A missing or unreadable file falls back to the defaults.
    pub fn get_config(&self) -> StudioConfig {
        {
            let read_lock = self.config.read().expect("config lock poisoned");
            if let Some(cached) = read_lock.as_ref() {
                return cached.clone();
            }
        }

        let loaded = Self::load_default_location().unwrap_or_else(|err| {
            tracing::warn!("[ConfigService] Falling back to defaults: {}", err);
            StudioConfig::default()
        });

        let mut write_lock = self.config.write().expect("config lock poisoned");
        *write_lock = Some(loaded.clone());
        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().expect("config lock poisoned");
        *write_lock = None;
    }

    /// Loads the configuration from an explicit path.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load_from(path: &Path) -> Result<StudioConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(StudioConfig::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn load_default_location() -> Result<StudioConfig> {
        let path = StudioPaths::config_file()
            .map_err(|e| voicecast_core::CastingError::config(e.to_string()))?;
        Self::load_from(&path)
    }
}
