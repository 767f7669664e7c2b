//! Client configuration: Rserve endpoint, package source, forecast defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::literal::is_valid_package_name;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6311;
pub const DEFAULT_REPO_URL: &str = "http://cran.rstudio.com/";
pub const DEFAULT_LIBRARY: &str = "forecast";
pub const DEFAULT_HORIZON: usize = 20;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Config file consulted when `RFORECAST_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "rforecast.json";

/// Top-level client configuration (persisted as JSON, overridable by env).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Never written back to disk.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Package source used when the forecasting library is missing.
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
    #[serde(default = "default_library")]
    pub library: String,
    #[serde(default = "default_horizon")]
    pub default_horizon: usize,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_repo_url() -> String {
    DEFAULT_REPO_URL.into()
}
fn default_library() -> String {
    DEFAULT_LIBRARY.into()
}
fn default_horizon() -> usize {
    DEFAULT_HORIZON
}
fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            repo_url: DEFAULT_REPO_URL.into(),
            library: DEFAULT_LIBRARY.into(),
            default_horizon: DEFAULT_HORIZON,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ForecastConfig {
    /// Load from the file named by `RFORECAST_CONFIG` (or `rforecast.json`),
    /// apply environment overrides, and validate.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("RFORECAST_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file, or return defaults.
    ///
    /// A missing file is normal; a malformed one is an `Error::Json`.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(config_path) {
            Ok(s) => s,
            Err(_) => {
                debug!("No config file at {}, using defaults", config_path.display());
                return Ok(Self::default());
            }
        };
        let config = serde_json::from_str(&raw).map_err(|e| {
            warn!("Malformed config {}: {}", config_path.display(), e);
            Error::Json(e)
        })?;
        debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RSERVE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("RSERVE_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("RSERVE_PORT is not a port: {}", port)))?;
        }
        if let Some(user) = lookup("RSERVE_USER") {
            self.username = Some(user);
        }
        if let Some(password) = lookup("RSERVE_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(url) = lookup("RFORECAST_REPO_URL") {
            self.repo_url = url;
        }
        if let Some(library) = lookup("RFORECAST_LIBRARY") {
            self.library = library;
        }
        if let Some(h) = lookup("RFORECAST_HORIZON") {
            self.default_horizon = h
                .parse()
                .map_err(|_| Error::Config(format!("RFORECAST_HORIZON is not a count: {}", h)))?;
        }
        Ok(())
    }

    /// Reject values that would produce an unusable session or expression.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".into()));
        }
        if !is_valid_package_name(&self.library) {
            return Err(Error::Config(format!(
                "'{}' is not a valid R package name",
                self.library
            )));
        }
        if !(self.repo_url.starts_with("http://") || self.repo_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "repository URL must be http(s): {}",
                self.repo_url
            )));
        }
        if self.default_horizon == 0 {
            return Err(Error::Config("default horizon must be positive".into()));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(Error::Config(
                "username and password must be given together".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` for the Rserve endpoint.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credentials for servers that require login.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ForecastConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:6311");
        assert_eq!(config.repo_url, "http://cran.rstudio.com/");
        assert_eq!(config.library, "forecast");
        assert!(config.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForecastConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rforecast.json");
        std::fs::write(&path, r#"{"host": "r.internal", "default_horizon": 6}"#).unwrap();

        let config = ForecastConfig::load(&path).unwrap();
        assert_eq!(config.host, "r.internal");
        assert_eq!(config.default_horizon, 6);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.library, DEFAULT_LIBRARY);
    }

    #[test]
    fn test_load_malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rforecast.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ForecastConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_remote());
    }

    #[test]
    fn test_overrides() {
        let mut config = ForecastConfig::default();
        config
            .apply_overrides(lookup(&[
                ("RSERVE_HOST", "10.0.0.5"),
                ("RSERVE_PORT", "7000"),
                ("RSERVE_USER", "analyst"),
                ("RSERVE_PASSWORD", "s3cret"),
                ("RFORECAST_REPO_URL", "https://cloud.r-project.org/"),
                ("RFORECAST_HORIZON", "12"),
            ]))
            .unwrap();

        assert_eq!(config.addr(), "10.0.0.5:7000");
        assert_eq!(config.credentials(), Some(("analyst", "s3cret")));
        assert_eq!(config.repo_url, "https://cloud.r-project.org/");
        assert_eq!(config.default_horizon, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = ForecastConfig::default();
        let err = config
            .apply_overrides(lookup(&[("RSERVE_PORT", "sixty")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ForecastConfig::default();
        config.library = "fore'cast".into();
        assert!(config.validate().is_err());

        let mut config = ForecastConfig::default();
        config.repo_url = "ftp://mirror".into();
        assert!(config.validate().is_err());

        let mut config = ForecastConfig::default();
        config.username = Some("only-user".into());
        assert!(config.validate().is_err());

        let mut config = ForecastConfig::default();
        config.default_horizon = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let mut config = ForecastConfig::default();
        config.username = Some("u".into());
        config.password = Some("p".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"username\""));
        assert!(!json.contains("\"password\""));
    }
}
