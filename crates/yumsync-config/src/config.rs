use std::{collections::HashMap, collections::HashSet, env, fs, path::Path, path::PathBuf};

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, Result};

pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_SCRATCH_DIR: &str = "/var/tmp/";

/// Validated runtime configuration.
///
/// Built from a TOML file, from `YUMSYNC_*` environment variables, or both
/// (environment values override the file). Every upstream repository URL is
/// guaranteed to be https and to end with a trailing slash.
#[derive(Clone, Debug)]
pub struct Config {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub bucket_name: String,
    pub bucket_region: String,

    /// Custom S3 endpoint for S3-compatible stores. Absent means AWS.
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing. Required by most non-AWS endpoints.
    pub path_style: bool,

    /// Maximum number of concurrent transfers.
    /// Default: 4
    pub max_workers: usize,

    /// Directory under which per-cycle scratch directories are created.
    /// Default: /var/tmp/
    pub scratch_dir: PathBuf,

    /// Upstream repository base URLs.
    pub upstream_repositories: Vec<Url>,

    /// Treat a checksum algorithm this tool cannot verify as a transfer
    /// failure instead of falling back to a size-only check.
    /// Default: false
    pub require_checksum: bool,

    /// Statsd metrics destination. Metrics are disabled when absent.
    pub statsd: Option<StatsdConfig>,
}

/// Statsd collector settings.
#[derive(Clone, Debug, Deserialize)]
pub struct StatsdConfig {
    /// Default: 127.0.0.1
    #[serde(default = "default_statsd_host")]
    pub host: String,

    /// Default: 8125
    #[serde(default = "default_statsd_port")]
    pub port: u16,

    /// Tags attached to every metric.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_statsd_host() -> String {
    "127.0.0.1".to_string()
}

fn default_statsd_port() -> u16 {
    8125
}

/// Pre-validation shape of the configuration. Required fields stay optional
/// here so a file and the environment can each fill in part of the picture.
#[derive(Default, Deserialize)]
struct RawConfig {
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    bucket_name: Option<String>,
    bucket_region: Option<String>,
    endpoint_url: Option<String>,
    path_style: Option<bool>,
    max_workers: Option<usize>,
    scratch_dir: Option<String>,
    upstream_repositories: Option<Vec<String>>,
    require_checksum: Option<bool>,
    statsd: Option<StatsdConfig>,
}

impl Config {
    /// Loads configuration from a TOML file, then applies any `YUMSYNC_*`
    /// environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let mut raw: RawConfig = toml::from_str(&content)?;
        raw.apply_env()?;
        raw.validate()
    }

    /// Builds configuration purely from `YUMSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut raw = RawConfig::default();
        raw.apply_env()?;
        raw.validate()
    }
}

impl RawConfig {
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var("YUMSYNC_AWS_ACCESS_KEY_ID") {
            self.aws_access_key_id = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_AWS_SECRET_ACCESS_KEY") {
            self.aws_secret_access_key = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_BUCKET_NAME") {
            self.bucket_name = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_BUCKET_REGION") {
            self.bucket_region = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_ENDPOINT_URL") {
            self.endpoint_url = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_PATH_STYLE") {
            self.path_style = Some(parse_bool("YUMSYNC_PATH_STYLE", &v)?);
        }
        if let Ok(v) = env::var("YUMSYNC_MAX_WORKERS") {
            let workers = v.parse().map_err(|_| {
                ConfigError::InvalidEnvValue {
                    name: "YUMSYNC_MAX_WORKERS",
                    value: v,
                }
            })?;
            self.max_workers = Some(workers);
        }
        if let Ok(v) = env::var("YUMSYNC_SCRATCH_DIR") {
            self.scratch_dir = Some(v);
        }
        if let Ok(v) = env::var("YUMSYNC_UPSTREAM_REPOSITORIES") {
            let repos = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            self.upstream_repositories = Some(repos);
        }
        if let Ok(v) = env::var("YUMSYNC_REQUIRE_CHECKSUM") {
            self.require_checksum = Some(parse_bool("YUMSYNC_REQUIRE_CHECKSUM", &v)?);
        }
        if let Ok(host) = env::var("YUMSYNC_STATSD_HOST") {
            let statsd = self.statsd.get_or_insert_with(|| {
                StatsdConfig {
                    host: default_statsd_host(),
                    port: default_statsd_port(),
                    tags: HashMap::new(),
                }
            });
            statsd.host = host;
        }
        if let Ok(v) = env::var("YUMSYNC_STATSD_PORT") {
            let port = v.parse().map_err(|_| {
                ConfigError::InvalidEnvValue {
                    name: "YUMSYNC_STATSD_PORT",
                    value: v,
                }
            })?;
            if let Some(ref mut statsd) = self.statsd {
                statsd.port = port;
            }
        }
        Ok(())
    }

    fn validate(self) -> Result<Config> {
        let aws_access_key_id = self
            .aws_access_key_id
            .ok_or(ConfigError::MissingField("aws_access_key_id"))?;
        let aws_secret_access_key = self
            .aws_secret_access_key
            .ok_or(ConfigError::MissingField("aws_secret_access_key"))?;
        let bucket_name = self
            .bucket_name
            .ok_or(ConfigError::MissingField("bucket_name"))?;
        let bucket_region = self
            .bucket_region
            .ok_or(ConfigError::MissingField("bucket_region"))?;

        let max_workers = self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers < 1 {
            return Err(ConfigError::InvalidWorkerCount);
        }

        let repos = self
            .upstream_repositories
            .ok_or(ConfigError::MissingField("upstream_repositories"))?;
        if repos.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let mut seen = HashSet::new();
        let mut upstream_repositories = Vec::with_capacity(repos.len());
        for repo in repos {
            // Relative joins against the base URL require the trailing slash.
            let normalized = if repo.ends_with('/') {
                repo
            } else {
                format!("{repo}/")
            };
            let url = Url::parse(&normalized)
                .map_err(|_| ConfigError::InvalidRepositoryUrl(normalized.clone()))?;
            if url.scheme() != "https" {
                return Err(ConfigError::InsecureRepositoryUrl(normalized));
            }
            if !seen.insert(url.to_string()) {
                return Err(ConfigError::DuplicateRepositoryUrl(normalized));
            }
            upstream_repositories.push(url);
        }

        Ok(Config {
            aws_access_key_id,
            aws_secret_access_key,
            bucket_name,
            bucket_region,
            endpoint_url: self.endpoint_url,
            path_style: self.path_style.unwrap_or(false),
            max_workers,
            scratch_dir: PathBuf::from(
                self.scratch_dir
                    .unwrap_or_else(|| DEFAULT_SCRATCH_DIR.to_string()),
            ),
            upstream_repositories,
            require_checksum: self.require_checksum.unwrap_or(false),
            statsd: self.statsd,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => {
            Err(ConfigError::InvalidEnvValue {
                name,
                value: value.to_string(),
            })
        }
    }
}
