//! Configuration Management
//!
//! Configuration is read once when the process starts, either from
//! `CLOUDBOX_*` environment variables or from a YAML file, and then handed
//! by reference to every invocation. Handlers never look at the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment variable read by [`Config::from_env`]
pub const ENV_PREFIX: &str = "CLOUDBOX_";

/// Process configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Socket address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Object storage bucket used for uploads, user data and function code
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Source IPs allowed to POST operations
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    /// Hostnames resolved at request time and allowed like `allowed_ips`
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Mirror every session log line to tracing
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub verbose: bool,
    /// Default tags applied to newly created compute resources
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: BTreeMap<String, String>,
    /// Base URL of the control-plane REST API
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    /// Bearer token sent to the control plane
    #[serde(default)]
    pub control_plane_token: Option<String>,
    /// Local scratch directory for uploads and local operations
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Delay between two spot-request describe calls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Describe calls allowed before a spot request is reported as timed out
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    /// Take the client address from the first `X-Forwarded-For` entry
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub trust_forwarded_for: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_control_plane_url() -> String {
    "http://127.0.0.1:4566".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_max_attempts() -> u32 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            bucket_name: None,
            allowed_ips: Vec::new(),
            allowed_hosts: Vec::new(),
            verbose: false,
            tags: BTreeMap::new(),
            control_plane_url: default_control_plane_url(),
            control_plane_token: None,
            scratch_dir: default_scratch_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            trust_forwarded_for: false,
        }
    }
}

impl Config {
    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudbox").join("config.yaml"))
    }

    /// Load configuration: explicit file > default file if present > environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_yaml_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_yaml_file(&path),
            _ => Self::from_env(),
        }
    }

    /// Read `CLOUDBOX_*` environment variables
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("failed to load config from CLOUDBOX_* env vars")
    }

    /// Read a YAML config file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Allowed source IPs with blanks removed
    pub fn allowed_ips(&self) -> impl Iterator<Item = &str> {
        non_blank(&self.allowed_ips)
    }

    /// Allowed hostnames with blanks removed
    pub fn allowed_hosts(&self) -> impl Iterator<Item = &str> {
        non_blank(&self.allowed_hosts)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn non_blank(items: &[String]) -> impl Iterator<Item = &str> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Accepts a real boolean (YAML) or the strings `yes`/`true`/`1` (environment)
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => matches!(s.trim().to_lowercase().as_str(), "yes" | "true" | "1"),
    })
}

/// Accepts a mapping (YAML) or a JSON object encoded as a string (environment).
/// A string that is not a JSON object is ignored.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        Map(BTreeMap<String, String>),
        Json(String),
    }

    Ok(match Tags::deserialize(deserializer)? {
        Tags::Map(map) => map,
        Tags::Json(s) if s.trim().is_empty() => BTreeMap::new(),
        Tags::Json(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed default tags: {}", e);
            BTreeMap::new()
        }),
    })
}
