//! Runtime configuration.
//!
//! Values come from command-line flags first, then the environment
//! (`GITHUB_TOKEN`, `GITHUB_ORG`, `GITHUB_API_URL`, `BACKPORT_CACHE_DIR`,
//! `BACKPORT_CLONE_URL`), then defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BackportError, BackportResult};
use crate::hosting::github::DEFAULT_API_URL;

pub const DEFAULT_CLONE_BASE_URL: &str = "https://github.com";

/// Settings shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackportConfig {
    /// Personal access token for the hosting API.
    #[serde(skip_serializing, default)]
    pub token: String,
    /// Organisation used for `repo/number` targets.
    pub org: Option<String>,
    pub api_url: String,
    /// Base URL repositories are cloned from.
    pub clone_base_url: String,
    /// Root of the local repository mirrors.
    pub cache_root: PathBuf,
}

impl Default for BackportConfig {
    fn default() -> Self {
        BackportConfig {
            token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
            org: std::env::var("GITHUB_ORG").ok().filter(|o| !o.is_empty()),
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            clone_base_url: std::env::var("BACKPORT_CLONE_URL")
                .unwrap_or_else(|_| DEFAULT_CLONE_BASE_URL.to_string()),
            cache_root: std::env::var_os("BACKPORT_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_root),
        }
    }
}

/// `<tmp>/git_cache`.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("git_cache")
}

impl BackportConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(token: &str) -> Self {
        BackportConfig {
            token: token.to_string(),
            org: None,
            api_url: DEFAULT_API_URL.to_string(),
            clone_base_url: DEFAULT_CLONE_BASE_URL.to_string(),
            cache_root: default_cache_root(),
        }
    }

    pub fn with_org(mut self, org: &str) -> Self {
        self.org = Some(org.to_string()).filter(|o| !o.is_empty());
        self
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    pub fn with_clone_base_url(mut self, url: &str) -> Self {
        self.clone_base_url = url.to_string();
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Reject configurations no command can run with.
    pub fn validate(&self) -> BackportResult<()> {
        if self.token.trim().is_empty() {
            return Err(BackportError::Config(
                "github auth not configured (--github-token or GITHUB_TOKEN)".to_string(),
            ));
        }
        if !self.api_url.starts_with("http") {
            return Err(BackportError::Config(format!(
                "api url `{}` must be an http(s) URL",
                self.api_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_rejected() {
        let cfg = BackportConfig::new("  ");
        assert!(matches!(cfg.validate(), Err(BackportError::Config(_))));
    }

    #[test]
    fn builder_overrides() {
        let cfg = BackportConfig::new("t0ken")
            .with_org("acme")
            .with_api_url("https://ghe.example.com/api/v3")
            .with_cache_root("/var/cache/backport");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.org.as_deref(), Some("acme"));
        assert_eq!(cfg.cache_root, PathBuf::from("/var/cache/backport"));
    }

    #[test]
    fn empty_org_is_none() {
        let cfg = BackportConfig::new("t").with_org("");
        assert!(cfg.org.is_none());
    }

    #[test]
    fn bad_api_url_is_rejected() {
        let cfg = BackportConfig::new("t").with_api_url("api.github.com");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn token_is_not_serialized() {
        let json = serde_json::to_string(&BackportConfig::new("secret")).unwrap();
        assert!(!json.contains("secret"));
    }
}
