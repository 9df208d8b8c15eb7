use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::buildkite::ApiSource;
use crate::synthesis::{TracerScope, DEFAULT_MAX_DEPTH};

const CANDIDATES: [&str; 4] = ["citrace.toml", "citrace.json", "citrace.yaml", "citrace.yml"];

/// Configuration file structure for citrace.
///
/// Holds the Buildkite credentials and where synthesized spans are sent.
/// Every value can be overridden from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub buildkite: BuildkiteConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildkiteConfig {
    /// Buildkite API access token
    pub token: Option<String>,

    /// GraphQL endpoint
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// REST API base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Which API build records are read from
    #[serde(default)]
    pub source: ApiSource,

    /// Page size for the jobs connection of a build (GraphQL only)
    #[serde(default = "default_jobs_per_build")]
    pub jobs_per_build: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TracingConfig {
    /// OTLP/HTTP traces endpoint of the collector
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub exporter: ExporterKind,

    #[serde(default)]
    pub scope: TracerScope,

    /// Trigger hops followed below the root build
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    #[default]
    Otlp,
    /// Log spans instead of sending them
    Log,
}

impl Default for BuildkiteConfig {
    fn default() -> Self {
        Self {
            token: None,
            graphql_url: default_graphql_url(),
            rest_url: default_rest_url(),
            source: ApiSource::default(),
            jobs_per_build: default_jobs_per_build(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            exporter: ExporterKind::default(),
            scope: TracerScope::default(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_graphql_url() -> String {
    "https://graphql.buildkite.com/v1".to_string()
}

fn default_rest_url() -> String {
    "https://api.buildkite.com/v2/".to_string()
}

fn default_jobs_per_build() -> usize {
    500
}

fn default_endpoint() -> String {
    "http://localhost:4318/v1/traces".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./citrace.toml
    /// 3. ./citrace.json
    /// 4. ./citrace.yaml
    /// 5. ./citrace.yml
    /// 6. `<config dir>/citrace/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("citrace").join("config.toml"));

        match Self::find(Path::new("."), user_config) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn find(dir: &Path, user_config: Option<PathBuf>) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .chain(user_config)
            .find(|path| path.exists())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}
