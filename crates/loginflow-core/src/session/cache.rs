//! On-disk session cache.
//!
//! Stores the last session in `<base>/session.json` with restricted
//! permissions (0600). Tokens are never logged or displayed in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Session;
use crate::auth::{Token, UserProfile};

/// Serialized form of a saved session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCache {
    /// API the token was issued by.
    pub base_url: String,
    pub token: Token,
    pub user: UserProfile,
    pub logged_in_at: DateTime<Utc>,
}

impl SessionCache {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            base_url: base_url.into(),
            token: session.token,
            user: session.user,
            logged_in_at: Utc::now(),
        }
    }

    pub fn session(&self) -> Session {
        Session {
            token: self.token.clone(),
            user: self.user.clone(),
        }
    }

    /// Loads the cache from `path`.
    /// Returns `None` if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;

        serde_json::from_str(&contents)
            .map(Some)
            .with_context(|| format!("Failed to parse session from {}", path.display()))
    }

    /// Saves the cache to `path` with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }

    /// Deletes the cache file. Returns whether a file was removed.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn session() -> Session {
        Session {
            token: Token::new("abc123"),
            user: serde_json::from_value(serde_json::json!({"id": 1, "name": "John"})).unwrap(),
        }
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        assert!(SessionCache::load(&dir.path().join("session.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        SessionCache::new("http://api.test", session()).save(&path).unwrap();

        let loaded = SessionCache::load(&path).unwrap().unwrap();
        assert_eq!(loaded.base_url, "http://api.test");
        assert_eq!(loaded.session(), session());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        SessionCache::new("http://api.test", session()).save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(!SessionCache::remove(&path).unwrap());
        SessionCache::new("http://api.test", session()).save(&path).unwrap();
        assert!(SessionCache::remove(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(SessionCache::load(&path).is_err());
    }
}
