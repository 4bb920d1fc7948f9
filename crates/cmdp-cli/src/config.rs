//! Configuration management for the CMD publishing CLI
//!
//! Settings come from defaults overridden by environment variables. Command
//! line flags for the base URL and credentials path win over both.

use crate::error::{CmdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Publishing platform base URL when not specified via environment variable.
pub const DEFAULT_BASE_URL: &str = "https://publishing.ons.gov.uk";

/// Staging bucket that completed chunked uploads land in.
pub const DEFAULT_UPLOAD_BUCKET_URL: &str =
    "https://s3-eu-west-1.amazonaws.com/ons-dp-production-publishing-uploaded-datasets";

/// Default timeout for API requests in seconds.
/// Set to 5 minutes to accommodate slow chunk acknowledgements.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_JOB_LOOKUP_ATTEMPTS: u32 = 3;

pub const DEFAULT_JOB_LOOKUP_DELAY_SECS: u64 = 2;

pub const DEFAULT_BATCH_PAUSE_SECS: u64 = 2;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Publishing platform URL
    pub base_url: String,

    /// Path of the JSON credentials file
    pub credentials_path: Option<PathBuf>,

    /// Bucket URL used to derive storage locators
    pub upload_bucket_url: String,

    /// Wait between instance status queries
    pub poll_interval: Duration,

    /// Overall limit on waiting for an import; `None` waits forever
    pub poll_timeout: Option<Duration>,

    /// Per-request HTTP timeout
    pub api_timeout: Duration,

    /// Times the job list is re-read when the newest job belongs to another recipe
    pub job_lookup_attempts: u32,

    pub job_lookup_delay: Duration,

    /// Pause between datasets in the batch upload phase
    pub batch_pause: Duration,

    /// Accept self-signed certificates (local environments only)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials_path: None,
            upload_bucket_url: DEFAULT_UPLOAD_BUCKET_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_timeout: None,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            job_lookup_attempts: DEFAULT_JOB_LOOKUP_ATTEMPTS,
            job_lookup_delay: Duration::from_secs(DEFAULT_JOB_LOOKUP_DELAY_SECS),
            batch_pause: Duration::from_secs(DEFAULT_BATCH_PAUSE_SECS),
            accept_invalid_certs: false,
        }
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(url) = std::env::var("CMD_BASE_URL") {
            config.base_url = url;
        }

        if let Ok(path) = std::env::var("CMD_CREDENTIALS") {
            config.credentials_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("CMD_UPLOAD_BUCKET_URL") {
            config.upload_bucket_url = url;
        }

        if let Some(secs) = env_parse::<u64>("CMD_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = env_parse::<u64>("CMD_POLL_TIMEOUT_SECS")? {
            config.poll_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(secs) = env_parse::<u64>("CMD_API_TIMEOUT_SECS")? {
            config.api_timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = env_parse::<u32>("CMD_JOB_LOOKUP_ATTEMPTS")? {
            config.job_lookup_attempts = attempts.max(1);
        }

        if let Some(secs) = env_parse::<u64>("CMD_JOB_LOOKUP_DELAY_SECS")? {
            config.job_lookup_delay = Duration::from_secs(secs);
        }

        if let Some(secs) = env_parse::<u64>("CMD_BATCH_PAUSE_SECS")? {
            config.batch_pause = Duration::from_secs(secs);
        }

        if let Some(accept) = env_parse::<bool>("CMD_ACCEPT_INVALID_CERTS")? {
            config.accept_invalid_certs = accept;
        }

        Ok(config)
    }

    /// Apply command line overrides
    pub fn with_overrides(mut self, base_url: Option<String>, credentials: Option<PathBuf>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if credentials.is_some() {
            self.credentials_path = credentials;
        }
        self
    }

    /// Get the base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Path of the credentials file, required by every authenticated command
    pub fn credentials_path(&self) -> Result<&Path> {
        self.credentials_path.as_deref().ok_or_else(|| {
            CmdError::config("No credentials file given. Pass --credentials or set CMD_CREDENTIALS")
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CmdError::config(format!("Invalid value '{}' for {}: {}", raw, key, e))),
        Err(_) => Ok(None),
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Login credentials for the publishing platform
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Load credentials from a JSON file: `{"email": "...", "password": "..."}`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CmdError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let credentials: Credentials = serde_json::from_str(&content)
            .map_err(|e| CmdError::config(format!("Credentials file {}: {}", path.display(), e)))?;

        if credentials.email.trim().is_empty() {
            return Err(CmdError::config(format!(
                "Credentials file {} has an empty email",
                path.display()
            )));
        }

        Ok(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, None);
        assert_eq!(config.job_lookup_attempts, 3);
        assert!(!config.accept_invalid_certs);
        assert!(config.credentials_path().is_err());
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("CMD_BASE_URL", "http://localhost:8082/");
        std::env::set_var("CMD_POLL_INTERVAL_SECS", "5");
        std::env::set_var("CMD_POLL_TIMEOUT_SECS", "600");

        let config = Config::from_env().unwrap();
        assert_eq!(config.base_url(), "http://localhost:8082");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Some(Duration::from_secs(600)));

        std::env::set_var("CMD_POLL_INTERVAL_SECS", "soon");
        assert!(matches!(Config::from_env(), Err(CmdError::Config(_))));

        std::env::remove_var("CMD_BASE_URL");
        std::env::remove_var("CMD_POLL_INTERVAL_SECS");
        std::env::remove_var("CMD_POLL_TIMEOUT_SECS");
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::new().with_overrides(
            Some("http://override".to_string()),
            Some(PathBuf::from("/secrets/login.json")),
        );
        assert_eq!(config.base_url(), "http://override");
        assert_eq!(
            config.credentials_path().unwrap(),
            Path::new("/secrets/login.json")
        );
    }

    #[test]
    fn test_credentials_load_and_redaction() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"email": "publisher@example.com", "password": "hunter2"}}"#).unwrap();

        let credentials = Credentials::load(file.path()).unwrap();
        assert_eq!(credentials.email, "publisher@example.com");

        let debug = format!("{:?}", credentials);
        assert!(debug.contains("publisher@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_credentials_missing_file() {
        assert!(matches!(
            Credentials::load("/does/not/exist.json"),
            Err(CmdError::FileNotFound(_))
        ));
    }
}
