use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.xbrowsersync.org";
pub const DEFAULT_CLIENT_VERSION: &str = "1.1.13";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Checked by [`load`](Self::load) and the overrides; see [`base_url`](Self::base_url).
    pub base_url: String,
    pub client_version: String,
    pub cache_max_age_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            cache_max_age_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// `<config dir>/marksync/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("marksync").join("config.json"))
    }

    /// Read a JSON config file. A missing file means defaults; missing keys
    /// fall back individually.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path: path.display().to_string(), source }),
        };
        let config: Self = serde_json::from_str(&data)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.base_url()?;
        Ok(config)
    }

    /// Default file location, then `MARKSYNC_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = match Self::default_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a lookup (normally the process environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MARKSYNC_BASE_URL") {
            Url::parse(&v).map_err(|e| invalid("MARKSYNC_BASE_URL", e))?;
            self.base_url = v;
        }
        if let Some(v) = lookup("MARKSYNC_CLIENT_VERSION") {
            self.client_version = v;
        }
        if let Some(v) = lookup("MARKSYNC_CACHE_MAX_AGE") {
            self.cache_max_age_secs = v.trim().parse().map_err(|e| invalid("MARKSYNC_CACHE_MAX_AGE", e))?;
        }
        if let Some(v) = lookup("MARKSYNC_REQUEST_TIMEOUT") {
            self.request_timeout_secs = v.trim().parse().map_err(|e| invalid("MARKSYNC_REQUEST_TIMEOUT", e))?;
        }
        Ok(self)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| invalid("baseUrl", e))
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(key: &str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("marksync-config-test-{}-{}", std::process::id(), n));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = SyncConfig::load(&temp_dir().join("nope.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.base_url().unwrap().as_str(), "https://api.xbrowsersync.org/");
        assert_eq!(config.cache_max_age(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_dir().join("config.json");
        std::fs::write(&path, r#"{ "baseUrl": "https://sync.example.org/api/", "cacheMaxAgeSecs": 0 }"#).unwrap();
        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://sync.example.org/api/");
        assert_eq!(config.cache_max_age_secs, 0);
        assert_eq!(config.client_version, DEFAULT_CLIENT_VERSION);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn garbage_file_is_parse_error() {
        let path = temp_dir().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SyncConfig::load(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, r#"{ "baseUrl": 5 }"#).unwrap();
        assert!(matches!(SyncConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn bad_base_url_in_file_names_key() {
        let path = temp_dir().join("config.json");
        std::fs::write(&path, r#"{ "baseUrl": "not a url" }"#).unwrap();
        let err = SyncConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "baseUrl"));

        let config = SyncConfig { base_url: "::".into(), ..SyncConfig::default() };
        assert!(config.base_url().is_err());
    }

    #[test]
    fn overrides_apply() {
        let env = HashMap::from([
            ("MARKSYNC_BASE_URL", "http://localhost:8080/"),
            ("MARKSYNC_CLIENT_VERSION", "2.0.0"),
            ("MARKSYNC_CACHE_MAX_AGE", " 60 "),
        ]);
        let config = SyncConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:8080/");
        assert_eq!(config.client_version, "2.0.0");
        assert_eq!(config.cache_max_age_secs, 60);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn bad_override_names_key() {
        let err = SyncConfig::default()
            .with_overrides(|k| (k == "MARKSYNC_REQUEST_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "MARKSYNC_REQUEST_TIMEOUT"));
    }
}
