//! Harvest run configuration
//!
//! A run is configured once at process start from a YAML file (plus CLI
//! overrides) and the resulting [`HarvestConfig`] is passed into the
//! controller by reference. There is no module-level mutable state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard cap on `page * per_page` the remote API is willing to serve.
///
/// Offsets beyond this are not addressable; the controller slides the date
/// window forward instead.
pub const OFFSET_CAP: u32 = 10_000;

/// Complete configuration for one harvest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Numerical code for the geographic region (e.g. 7146 for Zimbabwe)
    pub place_id: u32,

    /// Numerical code for the taxon (e.g. 85553 for Suborder Serpentes)
    pub taxon_id: u32,

    /// Page of results to begin at. A value of 1 is recommended; values
    /// whose offset exceeds the cap are only valid when resuming.
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Records per page of search results
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Directory holding the database file
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,

    /// Name of the database file (without extension)
    pub database_name: String,

    /// Destination table for observation rows
    pub table_name: String,

    /// Path of the checkpoint file recording the last persisted date
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,

    /// Base URL of the remote API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the website, used only for session login
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Optional login credentials; harvesting works anonymously without them
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpSettings,
}

/// Login credentials for the remote website
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Registered username (email)
    pub username: String,
    /// Corresponding password
    pub password: String,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum transport-level retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Token bucket refill rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Token bucket burst size
    #[serde(default = "default_requests_per_second")]
    pub burst_size: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_requests_per_second(),
        }
    }
}

fn default_start_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    100
}

fn default_database_dir() -> PathBuf {
    PathBuf::from("inaturalist_data")
}

fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("current_oldest_date.txt")
}

fn default_base_url() -> String {
    "https://api.inaturalist.org/v1".to_string()
}

fn default_site_url() -> String {
    "https://www.inaturalist.org".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_requests_per_second() -> u32 {
    1
}

impl HarvestConfig {
    /// Load a configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Load a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.start_page == 0 {
            return Err(Error::config("start_page must be at least 1"));
        }
        if self.per_page == 0 {
            return Err(Error::config("per_page must be at least 1"));
        }
        if self.per_page > OFFSET_CAP {
            return Err(Error::config(format!(
                "per_page {} exceeds the API offset cap of {OFFSET_CAP}",
                self.per_page
            )));
        }
        if self.database_name.is_empty() {
            return Err(Error::config("database_name cannot be empty"));
        }
        if self.table_name.is_empty() {
            return Err(Error::config("table_name cannot be empty"));
        }
        // Table name is interpolated into SQL, so restrict it to an identifier
        if !is_sql_identifier(&self.table_name) {
            return Err(Error::config(format!(
                "table_name '{}' must contain only letters, digits and underscores \
                 and must not start with a digit",
                self.table_name
            )));
        }
        url::Url::parse(&self.base_url)?;
        url::Url::parse(&self.site_url)?;
        Ok(())
    }

    /// Full path of the database file
    pub fn database_path(&self) -> PathBuf {
        self.database_dir
            .join(format!("{}.db", self.database_name))
    }

    /// Whether the configured starting offset is beyond the API cap.
    ///
    /// A start page past the cap is only meaningful when resuming an
    /// interrupted run from a checkpoint.
    pub fn start_offset_over_cap(&self) -> bool {
        self.start_page.saturating_mul(self.per_page) > OFFSET_CAP
    }
}

/// Check that a string is a plain SQL identifier
fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_yaml() -> &'static str {
        r"
place_id: 7146
taxon_id: 85553
database_name: snakes
table_name: observations
"
    }

    #[test]
    fn test_load_minimal_config() {
        let config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.place_id, 7146);
        assert_eq!(config.taxon_id, 85553);
        assert_eq!(config.start_page, 1);
        assert_eq!(config.per_page, 100);
        assert_eq!(config.base_url, "https://api.inaturalist.org/v1");
        assert_eq!(
            config.checkpoint_file,
            PathBuf::from("current_oldest_date.txt")
        );
        assert!(config.credentials.is_none());
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_database_path() {
        let config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("inaturalist_data/snakes.db")
        );
    }

    #[test]
    fn test_start_offset_over_cap() {
        let mut config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        assert!(!config.start_offset_over_cap());

        config.start_page = 100;
        assert!(!config.start_offset_over_cap()); // 100 * 100 == 10000, at the cap

        config.start_page = 101;
        assert!(config.start_offset_over_cap());
    }

    #[test]
    fn test_validate_rejects_zero_pages() {
        let mut config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        config.start_page = 0;
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        config.per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_table_name() {
        let mut config = HarvestConfig::from_yaml(minimal_yaml()).unwrap();
        config.table_name = "obs; DROP TABLE obs".to_string();
        assert!(config.validate().is_err());

        config.table_name = "1observations".to_string();
        assert!(config.validate().is_err());

        config.table_name = "observations_2024".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_with_credentials() {
        let yaml = r"
place_id: 6986
taxon_id: 26036
start_page: 3
per_page: 50
database_name: reptiles
table_name: reptile_obs
checkpoint_file: /tmp/ckpt.txt
credentials:
  username: someone@example.com
  password: hunter2
http:
  timeout_secs: 10
  max_retries: 1
  requests_per_second: 2
  burst_size: 4
";
        let config = HarvestConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.start_page, 3);
        assert_eq!(config.per_page, 50);
        assert_eq!(
            config.credentials.as_ref().unwrap().username,
            "someone@example.com"
        );
        assert_eq!(config.http.max_retries, 1);
        assert_eq!(config.http.burst_size, 4);
    }
}
