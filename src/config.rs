//! Configuration types for api-pipeline
//!
//! A pipeline configuration is one TOML file per environment,
//! `{config_dir}/{env}.toml`:
//!
//! ```toml
//! [defaults]
//! local_only = false
//! bucket = "acme-raw-data"
//! gcs_path_prefix = "dev"
//! create_bucket_if_missing = true
//!
//! [[endpoints]]
//! name = "census_variables"
//! url = "https://api.census.gov/data/2020/dec/pl/variables.json"
//! formats = ["json", "csv"]
//! gcs_path = "census"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable set by Cloud Run and 2nd gen Cloud Functions
pub const SERVERLESS_SERVICE_VAR: &str = "K_SERVICE";
/// Environment variable set by the Cloud Functions runtime
pub const SERVERLESS_TARGET_VAR: &str = "FUNCTION_TARGET";

/// Complete configuration for one pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Global settings shared by every endpoint
    #[serde(default)]
    pub defaults: PipelineDefaults,

    /// Endpoints, processed in declared order
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,

    /// Object store connection settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Run-wide defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineDefaults {
    /// Skip every remote upload (default: false)
    #[serde(default)]
    pub local_only: bool,

    /// Destination bucket (required unless `local_only`)
    #[serde(default)]
    pub bucket: String,

    /// First segment of every object path
    #[serde(default)]
    pub gcs_path_prefix: String,

    /// Create the bucket when it does not exist (default: false)
    #[serde(default)]
    pub create_bucket_if_missing: bool,

    /// Attempts per endpoint fetch (default: 3)
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Per-attempt request timeout in seconds (default: 30)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// What a failed endpoint fetch does to the rest of the run (default: abort)
    #[serde(default)]
    pub on_endpoint_error: EndpointFailurePolicy,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            local_only: false,
            bucket: String::new(),
            gcs_path_prefix: String::new(),
            create_bucket_if_missing: false,
            fetch_retries: default_fetch_retries(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            on_endpoint_error: EndpointFailurePolicy::default(),
        }
    }
}

impl PipelineDefaults {
    /// Per-attempt fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Policy applied when an endpoint cannot be fetched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointFailurePolicy {
    /// Log the failure and stop the run
    #[default]
    Abort,
    /// Log the failure, record it in the run report and move on
    Continue,
}

/// One remote data source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Unique name, used as the file prefix and log key
    pub name: String,

    /// Request URL
    pub url: String,

    /// HTTP verb (default: "GET")
    #[serde(default = "default_method")]
    pub method: String,

    /// Output formats in order (default: ["json"])
    ///
    /// Kept as raw names so an unknown format only skips that format.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    /// Path segment between the prefix and the file name in the bucket
    #[serde(default)]
    pub gcs_path: String,

    /// Folder override for local files
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Query string parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Object store connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON API base URL (default: "https://storage.googleapis.com")
    #[serde(default = "default_storage_base_url")]
    pub base_url: String,

    /// Project that owns newly created buckets
    #[serde(default)]
    pub project: Option<String>,

    /// Location for newly created buckets
    #[serde(default)]
    pub location: Option<String>,

    /// Static OAuth access token
    ///
    /// When unset, `GOOGLE_OAUTH_ACCESS_TOKEN` and then the metadata server are tried.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Send no credentials at all (emulators)
    #[serde(default)]
    pub anonymous: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_storage_base_url(),
            project: None,
            location: None,
            access_token: None,
            anonymous: false,
        }
    }
}

/// Where local files may be written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Regular host, any folder is writable
    #[default]
    Local,
    /// Request-scoped serverless sandbox, only the ephemeral directory is writable
    Ephemeral,
}

impl ExecutionMode {
    /// Detect the mode from the process environment
    pub fn detect() -> Self {
        Self::detect_from(|name| std::env::var_os(name).is_some())
    }

    /// Detect the mode using `is_set` to test for the serverless markers
    pub fn detect_from(is_set: impl Fn(&str) -> bool) -> Self {
        if is_set(SERVERLESS_SERVICE_VAR) || is_set(SERVERLESS_TARGET_VAR) {
            ExecutionMode::Ephemeral
        } else {
            ExecutionMode::Local
        }
    }
}

/// Process-level settings resolved once at startup
#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    /// Directory holding `{env}.toml` files (default: "config")
    pub config_dir: PathBuf,

    /// Default folder for local files (default: "output")
    pub output_dir: PathBuf,

    /// Folder for run log files (default: "logs")
    pub log_dir: PathBuf,

    /// Execution mode
    pub execution_mode: ExecutionMode,

    /// Folder used in [`ExecutionMode::Ephemeral`] (default: system temp dir)
    pub ephemeral_dir: PathBuf,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            execution_mode: ExecutionMode::Local,
            ephemeral_dir: std::env::temp_dir(),
        }
    }
}

impl RuntimeSettings {
    /// Folder the run log file goes to
    ///
    /// Ephemeral sandboxes only allow writes below the ephemeral directory, so
    /// logs move to `{ephemeral_dir}/logs` there.
    pub fn effective_log_dir(&self) -> PathBuf {
        match self.execution_mode {
            ExecutionMode::Local => self.log_dir.clone(),
            ExecutionMode::Ephemeral => self.ephemeral_dir.join("logs"),
        }
    }
}

impl PipelineConfig {
    /// Load and validate `{config_dir}/{env}.toml`
    ///
    /// The environment name is lowercased and must only contain ASCII
    /// letters, digits, `-` and `_`.
    pub async fn load(env: &str, config_dir: &Path) -> Result<Self> {
        let path = config_path(env, config_dir)?;

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::config(
                    format!("config file not found: {}", path.display()),
                    path.display().to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::config(
                    format!("failed to read {}: {}", path.display(), e),
                    path.display().to_string(),
                ));
            }
        };

        let config = Self::from_toml(&raw).map_err(|e| match e {
            Error::Config { message, key } => Error::Config {
                message: format!("{}: {}", path.display(), message),
                key: key.or_else(|| Some(path.display().to_string())),
            },
            other => other,
        })?;

        tracing::debug!(
            path = %path.display(),
            endpoints = config.endpoints.len(),
            "loaded pipeline config"
        );
        Ok(config)
    }

    /// Parse and validate a configuration document
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(raw).map_err(|e| Error::Config {
            message: format!("invalid config: {}", e.message()),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.defaults.fetch_retries == 0 {
            return Err(Error::config(
                "fetch_retries must be at least 1",
                "defaults.fetch_retries",
            ));
        }

        if !self.defaults.local_only && self.defaults.bucket.trim().is_empty() {
            return Err(Error::config(
                "bucket is required unless local_only is set",
                "defaults.bucket",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.name.trim().is_empty() {
                return Err(Error::config(
                    "endpoint name must not be empty",
                    format!("endpoints[{i}].name"),
                ));
            }
            if endpoint.url.trim().is_empty() {
                return Err(Error::config(
                    format!("endpoint '{}' has an empty url", endpoint.name),
                    format!("endpoints[{i}].url"),
                ));
            }
            if !seen.insert(endpoint.name.as_str()) {
                return Err(Error::config(
                    format!("duplicate endpoint name '{}'", endpoint.name),
                    format!("endpoints[{i}].name"),
                ));
            }
        }

        Ok(())
    }
}

/// Resolve the config file for `env` inside `config_dir`
pub fn config_path(env: &str, config_dir: &Path) -> Result<PathBuf> {
    let env = env.trim().to_lowercase();
    let valid = !env.is_empty()
        && env
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::config(
            format!("invalid environment name '{env}'"),
            "env",
        ));
    }
    Ok(config_dir.join(format!("{env}.toml")))
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_formats() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_storage_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}
