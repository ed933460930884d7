//! Configuration types for pinecone-migrate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::connectors::{DistanceMetric, ServerlessSpec};
use crate::error::{Error, Result};

/// Environment variable holding the source account key.
pub const SOURCE_API_KEY_VAR: &str = "PINECONE_SOURCE_API_KEY";
/// Environment variable holding the destination account key.
pub const DEST_API_KEY_VAR: &str = "PINECONE_DEST_API_KEY";
/// Environment variable holding the key used by management commands.
pub const API_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable holding the embedding service key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Largest page the list route accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default Pinecone control-plane URL.
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// Credentials and address of one index service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// API key.
    pub api_key: String,
    /// Control-plane base URL.
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
}

impl ServiceConfig {
    /// Creates a config for the default control plane.
    pub fn new(api_key: impl AsRef<str>) -> Self {
        Self {
            api_key: clean_api_key(api_key.as_ref()),
            control_plane_url: default_control_plane_url(),
        }
    }

    /// Overrides the control-plane URL.
    #[must_use]
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into();
        self
    }
}

/// One side of a migration: an account and an index in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Account settings.
    #[serde(flatten)]
    pub service: ServiceConfig,
    /// Index name.
    pub index: String,
}

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Index to read from.
    pub source: EndpointConfig,
    /// Index to write to.
    pub destination: EndpointConfig,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// Migration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Ids requested per list call (`None` = service default).
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Seconds between readiness checks of a new destination index.
    #[serde(default = "default_ready_poll_interval_secs")]
    pub ready_poll_interval_secs: u64,
    /// Maximum seconds to wait for a new destination index (0 = no limit).
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    /// Placement of a destination index created by the migration.
    #[serde(default)]
    pub spec: ServerlessSpec,
    /// List and fetch without writing to the destination.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            ready_poll_interval_secs: default_ready_poll_interval_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            spec: ServerlessSpec::default(),
            dry_run: false,
        }
    }
}

impl MigrationOptions {
    /// Interval between readiness checks.
    #[must_use]
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ready_poll_interval_secs)
    }

    /// Readiness deadline, `None` when unbounded.
    #[must_use]
    pub fn ready_timeout(&self) -> Option<Duration> {
        (self.ready_timeout_secs > 0).then(|| Duration::from_secs(self.ready_timeout_secs))
    }
}

/// Shape used when an index client has to create its index implicitly.
///
/// The defaults match `text-embedding-ada-002`; override them for any other
/// embedding model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefaults {
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Placement.
    pub spec: ServerlessSpec,
}

impl Default for IndexDefaults {
    fn default() -> Self {
        Self {
            dimension: 1536,
            metric: DistanceMetric::Cosine,
            spec: ServerlessSpec::default(),
        }
    }
}

fn default_control_plane_url() -> String {
    DEFAULT_CONTROL_PLANE_URL.to_string()
}

fn default_ready_poll_interval_secs() -> u64 {
    2
}

fn default_ready_timeout_secs() -> u64 {
    300
}

/// Strips whitespace and stray quoting left behind by `.env` parsing.
#[must_use]
pub fn clean_api_key(raw: &str) -> String {
    raw.replace(['"', '\''], "").trim().to_string()
}

/// Reads and cleans an API key from the environment.
///
/// # Errors
///
/// Returns an error if the variable is unset or empty after cleaning.
pub fn api_key_from_env(var: &str) -> Result<String> {
    let key = std::env::var(var).map(|v| clean_api_key(&v)).unwrap_or_default();
    if key.is_empty() {
        return Err(Error::Config(format!(
            "Missing environment variable '{}'",
            var
        )));
    }
    Ok(key)
}

impl MigrationConfig {
    /// Builds a configuration for two indexes on the default control plane.
    pub fn new(
        source_key: impl AsRef<str>,
        source_index: impl Into<String>,
        dest_key: impl AsRef<str>,
        dest_index: impl Into<String>,
    ) -> Self {
        Self {
            source: EndpointConfig {
                service: ServiceConfig::new(source_key),
                index: source_index.into(),
            },
            destination: EndpointConfig {
                service: ServiceConfig::new(dest_key),
                index: dest_index.into(),
            },
            options: MigrationOptions::default(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.source.service.api_key = clean_api_key(&config.source.service.api_key);
        config.destination.service.api_key = clean_api_key(&config.destination.service.api_key);
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        for (side, endpoint) in [("source", &self.source), ("destination", &self.destination)] {
            if endpoint.service.api_key.is_empty() {
                return Err(Error::Config(format!("{} api_key cannot be empty", side)));
            }
            if endpoint.index.trim().is_empty() {
                return Err(Error::Config(format!(
                    "{} index name cannot be empty",
                    side
                )));
            }
        }
        if let Some(page_size) = self.options.page_size {
            if page_size == 0 || page_size > MAX_PAGE_SIZE {
                return Err(Error::Config(format!(
                    "page_size must be between 1 and {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        if self.options.ready_poll_interval_secs == 0 {
            return Err(Error::Config(
                "ready_poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.page_size, None);
        assert_eq!(options.ready_poll_interval(), Duration::from_secs(2));
        assert_eq!(options.ready_timeout(), Some(Duration::from_secs(300)));
        assert!(!options.dry_run);
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let options = MigrationOptions {
            ready_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(options.ready_timeout(), None);
    }

    #[test]
    fn test_clean_api_key_strips_quotes() {
        assert_eq!(clean_api_key("  \"pc-123\"  "), "pc-123");
        assert_eq!(clean_api_key("'pc-456'"), "pc-456");
        assert_eq!(clean_api_key("pc-789\n"), "pc-789");
    }

    #[test]
    fn test_api_key_from_env_missing() {
        let result = api_key_from_env("PINECONE_MIGRATE_TEST_UNSET_VAR");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_index_defaults() {
        let defaults = IndexDefaults::default();
        assert_eq!(defaults.dimension, 1536);
        assert_eq!(defaults.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_config_validate_empty_index() {
        let config = MigrationConfig::new("key-a", "", "key-b", "dest");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_page_size() {
        let mut config = MigrationConfig::new("key-a", "src", "key-b", "dest");
        config.options.page_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_page_size_limit() {
        let mut config = MigrationConfig::new("key-a", "src", "key-b", "dest");
        config.options.page_size = Some(MAX_PAGE_SIZE);
        assert!(config.validate().is_ok());
        config.options.page_size = Some(MAX_PAGE_SIZE + 1);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
source:
  api_key: "src-key"
  index: products
destination:
  api_key: dst-key
  index: products-copy
  control_plane_url: http://localhost:5080
options:
  page_size: 50
  ready_timeout_secs: 0
  spec:
    cloud: gcp
    region: us-central1
"#;
        let config: MigrationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.index, "products");
        assert_eq!(
            config.source.service.control_plane_url,
            DEFAULT_CONTROL_PLANE_URL
        );
        assert_eq!(
            config.destination.service.control_plane_url,
            "http://localhost:5080"
        );
        assert_eq!(config.options.page_size, Some(50));
        assert_eq!(config.options.ready_poll_interval_secs, 2);
        assert_eq!(config.options.ready_timeout(), None);
        assert_eq!(config.options.spec.cloud, "gcp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file_cleans_keys() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source:\n  api_key: \"'quoted-key'\"\n  index: a\ndestination:\n  api_key: \" spaced \"\n  index: b"
        )
        .unwrap();

        let config = MigrationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.source.service.api_key, "quoted-key");
        assert_eq!(config.destination.service.api_key, "spaced");
        assert_eq!(config.options, MigrationOptions::default());
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = MigrationConfig::from_file(std::path::Path::new("/nonexistent/migration.yaml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
