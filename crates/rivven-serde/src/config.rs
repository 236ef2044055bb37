//! Serializer configuration

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the registry-backed serializer
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Schema registry URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// What to do with schemas fetched by id during decode
    #[serde(default)]
    pub fetch_policy: FetchPolicy,

    /// Reuse compiled codecs per schema id instead of recompiling each call
    #[serde(default = "default_true")]
    pub cache_codecs: bool,
}

fn default_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_timeout() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            timeout_ms: default_timeout(),
            fetch_policy: FetchPolicy::default(),
            cache_codecs: true,
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_ms", &self.timeout_ms)
            .field("fetch_policy", &self.fetch_policy)
            .field("cache_codecs", &self.cache_codecs)
            .finish()
    }
}

impl RegistryConfig {
    /// Create config pointing at the given registry URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set basic auth credentials
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the fetched-schema policy
    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    /// Enable or disable the compiled codec cache
    pub fn with_codec_cache(mut self, enabled: bool) -> Self {
        self.cache_codecs = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Registry URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Check the configuration before building a client from it
    pub fn validate(&self) -> Result<(), RegistryError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(RegistryError::Config(
                "schema registry url is empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RegistryError::Config(format!(
                "schema registry url must be http(s): {}",
                url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(RegistryError::Config(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(RegistryError::Config(
                "basic auth needs both username and password".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handling of schemas resolved from the remote registry by id at decode time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Keep fetched schema text so later messages with the same id skip the network
    #[default]
    CacheOnFetch,

    /// Refetch on every miss; the cache only grows through explicit registration
    NeverCache,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.url, "http://localhost:8081");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch_policy, FetchPolicy::CacheOnFetch);
        assert!(config.cache_codecs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RegistryConfig = serde_json::from_str(
            r#"{"url": "https://registry:8081/", "fetch_policy": "never_cache"}"#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://registry:8081");
        assert_eq!(config.fetch_policy, FetchPolicy::NeverCache);
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.cache_codecs);
    }

    #[test]
    fn test_sub_second_timeout_kept() {
        let config = RegistryConfig::new("http://registry").with_timeout(Duration::from_millis(1500));
        assert_eq!(config.timeout(), Duration::from_millis(1500));

        let config = RegistryConfig::new("http://registry").with_timeout(Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = RegistryConfig::new("http://localhost:8081").with_basic_auth("svc", "hunter2");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        assert!(RegistryConfig::new("").validate().is_err());
        assert!(RegistryConfig::new("ftp://registry").validate().is_err());
        assert!(RegistryConfig::new("http://registry")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());

        let mut half_auth = RegistryConfig::new("http://registry");
        half_auth.username = Some("svc".into());
        assert!(half_auth.validate().is_err());
    }
}
