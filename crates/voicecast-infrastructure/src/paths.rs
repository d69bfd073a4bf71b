//! Unified path management for VoiceCast configuration files.
//!
//! All configuration lives under the platform config directory
//! (`~/.config/voicecast/` on Linux), resolved via the `dirs` crate so the
//! layout is consistent across Linux, macOS and Windows.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform configuration directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find configuration directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for VoiceCast.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/voicecast/         # Config directory
/// └── config.toml              # Application configuration
/// ```
pub struct StudioPaths;

impl StudioPaths {
    /// Returns the VoiceCast configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("voicecast"))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path of the application configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_is_under_config_dir() {
        let dir = StudioPaths::config_dir().unwrap();
        let file = StudioPaths::config_file().unwrap();
        assert!(file.starts_with(&dir));
        assert_eq!(file.file_name().unwrap(), "config.toml");
    }
}
