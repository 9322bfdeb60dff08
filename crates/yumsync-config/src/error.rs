use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(yumsync_config::toml_deserialize),
        help("Check your config file syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(yumsync_config::io))]
    IoError(#[from] std::io::Error),

    #[error("Missing required configuration: {0}")]
    #[diagnostic(
        code(yumsync_config::missing_field),
        help("Set it in the config file or export the matching YUMSYNC_* environment variable")
    )]
    MissingField(&'static str),

    #[error("Invalid value for {name}: {value}")]
    #[diagnostic(code(yumsync_config::invalid_env_value))]
    InvalidEnvValue { name: &'static str, value: String },

    #[error("No upstream repositories configured")]
    #[diagnostic(
        code(yumsync_config::no_repositories),
        help("Add at least one URL to upstream_repositories")
    )]
    NoRepositories,

    #[error("Invalid repository URL: {0}")]
    #[diagnostic(
        code(yumsync_config::invalid_repository_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidRepositoryUrl(String),

    #[error("Insecure repository URL: {0}")]
    #[diagnostic(
        code(yumsync_config::insecure_repository_url),
        help("Upstream repositories must be served over https")
    )]
    InsecureRepositoryUrl(String),

    #[error("Duplicate repository URL: {0}")]
    #[diagnostic(
        code(yumsync_config::duplicate_repository),
        help("Each upstream repository must appear only once")
    )]
    DuplicateRepositoryUrl(String),

    #[error("max_workers must be at least 1")]
    #[diagnostic(code(yumsync_config::invalid_worker_count))]
    InvalidWorkerCount,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
