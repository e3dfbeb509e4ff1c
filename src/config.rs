//! Application configuration and the runtime repository configuration store.
//!
//! Two kinds of configuration live here. `AppConfig` holds ambient settings
//! loaded from the environment (page sizes, timeouts, the default lookback
//! window). `ConfigStore` holds the *target*: which repository to report on
//! and the authenticated client for it, set at runtime through the
//! configuration endpoint and replaced wholesale on each reconfiguration.

use crate::error::ReportError;
use crate::github::GitHubClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration as StdDuration;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "rust-lang").
    pub owner: String,
    /// The name of the repository (e.g., "rust").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Ambient settings loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Default lookback window (in days) when a report request does not
    /// specify one.
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,

    /// Page size hint sent with every list request.
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Hard limit on the number of paginated requests per listing.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Connect/read timeout for requests to the GitHub API, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Overrides the GitHub API root (GitHub Enterprise installs).
    #[serde(default)]
    pub github_api_root: Option<String>,
}

fn default_window_days() -> u32 {
    365
}

fn default_page_size() -> u8 {
    100
}

fn default_max_pages() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
            github_api_root: None,
        }
    }
}

/// A repository identity together with the client authenticated for it.
#[derive(Clone)]
pub struct ConfiguredRepo {
    pub repo: RepoId,
    pub client: GitHubClient,
}

/// Shared holder for the currently configured repository.
///
/// Report handlers run concurrently with reconfiguration, so reads and the
/// configure write go through an `RwLock`. A report that started before a
/// reconfiguration keeps the `ConfiguredRepo` clone it read and finishes
/// against the old target.
#[derive(Default)]
pub struct ConfigStore {
    inner: RwLock<Option<ConfiguredRepo>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new repository configuration from a credential file's raw
    /// bytes. Returns `true` when a new configuration was stored.
    ///
    /// With no credential supplied this is a no-op and prior state persists.
    /// A credential that fails to decode as UTF-8, or that the client
    /// builder rejects, leaves prior state untouched.
    pub fn configure(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&[u8]>,
        config: &AppConfig,
    ) -> Result<bool, ReportError> {
        let Some(bytes) = credential else {
            return Ok(false);
        };

        let token = std::str::from_utf8(bytes)?.trim().to_string();
        let repo_id = RepoId {
            owner: owner.to_string(),
            repo: repo.to_string(),
        };
        let client = GitHubClient::new(&token, config)?;

        let mut slot = self.inner.write().expect("configuration lock poisoned");
        *slot = Some(ConfiguredRepo {
            repo: repo_id,
            client,
        });
        Ok(true)
    }

    /// The current configuration, or `NotConfigured` while unset.
    pub fn current(&self) -> Result<ConfiguredRepo, ReportError> {
        self.inner
            .read()
            .expect("configuration lock poisoned")
            .clone()
            .ok_or(ReportError::NotConfigured)
    }

    /// The configured repository identity, never the credential.
    pub fn repo(&self) -> Option<RepoId> {
        self.inner
            .read()
            .expect("configuration lock poisoned")
            .as_ref()
            .map(|configured| configured.repo.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("DEFAULT_WINDOW_DAYS", "90");
        env::set_var("PAGE_SIZE", "50");
        env::set_var("MAX_PAGES", "10");
        env::set_var("REQUEST_TIMEOUT_SECS", "5");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.default_window_days, 90);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.github_api_root, None);

        env::remove_var("DEFAULT_WINDOW_DAYS");
        env::remove_var("PAGE_SIZE");
        env::remove_var("MAX_PAGES");
        env::remove_var("REQUEST_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        env::remove_var("DEFAULT_WINDOW_DAYS");
        env::remove_var("PAGE_SIZE");
        env::remove_var("MAX_PAGES");
        env::remove_var("REQUEST_TIMEOUT_SECS");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.default_window_days, 365);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 1000);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_configure_without_credential_is_noop() {
        let store = ConfigStore::new();
        let applied = store
            .configure("octo", "repo", None, &AppConfig::default())
            .expect("no-op configure should succeed");

        assert!(!applied);
        assert!(store.repo().is_none());
        assert!(matches!(
            store.current(),
            Err(ReportError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_configure_rejects_invalid_utf8_and_keeps_prior() {
        let store = ConfigStore::new();
        let config = AppConfig::default();

        store
            .configure("octo", "repo", Some(b"gh-token".as_slice()), &config)
            .expect("valid configure should succeed");
        assert_eq!(store.repo().unwrap().to_string(), "octo/repo");

        let result = store.configure("other", "project", Some([0xff, 0xfe].as_slice()), &config);
        assert!(matches!(result, Err(ReportError::Decode(_))));

        // Prior configuration is unchanged.
        assert_eq!(store.repo().unwrap().to_string(), "octo/repo");
    }

    #[tokio::test]
    async fn test_configure_trims_credential_whitespace() {
        let store = ConfigStore::new();
        let applied = store
            .configure(
                "octo",
                "repo",
                Some(b"gh-token\n".as_slice()),
                &AppConfig::default(),
            )
            .expect("configure should succeed");

        assert!(applied);
        assert_eq!(store.repo().unwrap().to_string(), "octo/repo");
    }
}
