//! Runtime configuration.
//!
//! The API credential and endpoint come from the environment, after an
//! optional `.env` file has been loaded. Everything per-run (paths, row
//! limit, model) comes from CLI flags instead.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConfigError;

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Default chat-completion endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for both jobs.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the chat-completion API.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl AiSettings {
    /// Read settings from the process environment.
    pub fn from_env(model: Option<&str>) -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingVar(API_KEY_VAR))?;
        info!("API key loaded from {}", API_KEY_VAR);

        let base_url = env::var(BASE_URL_VAR)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }
}

/// Load a `.env` file into the process environment.
///
/// An explicit path must exist. Without one, the usual lookup from the
/// current directory upwards is attempted and a miss is only a warning.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).map_err(|source| ConfigError::EnvFile {
                path: p.to_path_buf(),
                source,
            })?;
            info!("Loaded .env file from: {}", p.display());
            Ok(Some(p.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => {
                info!("Loaded .env file from: {}", found.display());
                Ok(Some(found))
            }
            Err(_) => {
                warn!("No .env file found, using process environment only");
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.env");
        let err = load_env_file(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    fn test_explicit_env_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "MUGSHOT_CHARGES_TEST_VAR=loaded").unwrap();

        let loaded = load_env_file(Some(&path)).unwrap();
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(env::var("MUGSHOT_CHARGES_TEST_VAR").unwrap(), "loaded");
    }
}
