//! Configuration management for loginflow.
//!
//! Loads configuration from ${LOGINFLOW_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "LOGINFLOW_BASE_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for loginflow configuration and data files.
    //!
    //! LOGINFLOW_HOME resolution order:
    //! 1. LOGINFLOW_HOME environment variable (if set)
    //! 2. ~/.config/loginflow (default)
    //! 3. ./.loginflow when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the loginflow home directory.
    pub fn loginflow_home() -> PathBuf {
        if let Ok(home) = std::env::var("LOGINFLOW_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".loginflow"),
            |h| h.join(".config").join("loginflow"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        loginflow_home().join("config.toml")
    }

    /// Returns the path to the cached session file.
    pub fn session_path() -> PathBuf {
        loginflow_home().join("session.json")
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Authorization header scheme, e.g. `Token` or `Bearer`.
    pub token_scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000/auth";
    pub const DEFAULT_TOKEN_SCHEME: &'static str = "Token";

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Resolves the base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL does not parse.
    pub fn resolve_base_url(&self) -> Result<String> {
        let env_url = std::env::var(BASE_URL_ENV).ok();
        resolve_base_url(env_url.as_deref(), Some(&self.base_url))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            token_scheme: Self::DEFAULT_TOKEN_SCHEME.to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Field validation patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub username_pattern: String,
    pub password_pattern: String,
}

impl ValidationConfig {
    pub const DEFAULT_USERNAME_PATTERN: &'static str = r"^[A-Za-z0-9_.@+-]{3,150}$";
    pub const DEFAULT_PASSWORD_PATTERN: &'static str = r"^\S{6,128}$";
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            username_pattern: Self::DEFAULT_USERNAME_PATTERN.to_string(),
            password_pattern: Self::DEFAULT_PASSWORD_PATTERN.to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub validation: ValidationConfig,
    pub log: LogConfig,
}

impl Config {
    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default config template to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Renders the defaults as TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn generate() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
    }

    /// Resolves a log file path against the home directory.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                paths::loginflow_home().join(file)
            }
        })
    }
}

/// Picks the first non-empty URL from env, then config, then the default.
fn resolve_base_url(env_url: Option<&str>, config_url: Option<&str>) -> Result<String> {
    let chosen = [env_url, config_url]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(ApiConfig::DEFAULT_BASE_URL);

    url::Url::parse(chosen).with_context(|| format!("Invalid API base URL: {chosen}"))?;
    Ok(chosen.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(config.api.token_scheme, "Token");
        assert!(config.api.request_timeout().is_none());
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(config.validation, ValidationConfig::default());
        assert_eq!(config.log.level, "warn");
        assert!(config.log.file.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[api]\ntoken_scheme = \"Bearer\"\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api.token_scheme, "Bearer");
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(config.api.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbase_url = 1").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::init(&path).unwrap();
        assert!(path.exists());
        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn test_generate_roundtrips() {
        let toml = Config::generate().unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.validation, ValidationConfig::default());
    }

    #[test]
    fn test_resolve_base_url_precedence() {
        assert_eq!(
            resolve_base_url(Some("http://env.test/api/"), Some("http://config.test")).unwrap(),
            "http://env.test/api"
        );
        assert_eq!(
            resolve_base_url(Some("  "), Some("http://config.test")).unwrap(),
            "http://config.test"
        );
        assert_eq!(
            resolve_base_url(None, None).unwrap(),
            ApiConfig::DEFAULT_BASE_URL
        );
        assert!(resolve_base_url(None, Some("not a url")).is_err());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let api = ApiConfig {
            request_timeout_secs: Some(0),
            ..ApiConfig::default()
        };
        assert!(api.request_timeout().is_none());
    }
}
