use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpluginError {
    #[error("Failed to get plugins list: all {} mirrors failed", .errors.len())]
    CatalogUnavailable { errors: Vec<RpluginError> },

    #[error("Mirror {url} responded with HTTP {status}")]
    MirrorStatus { url: String, status: u16 },

    #[error("Package not found on index: {package}")]
    PackageNotFound { package: String },

    #[error("Failed to fetch metadata for {package}: HTTP {status}")]
    PackageFetch { package: String, status: u16 },

    #[error("GitHub API error {message} ({status})")]
    RepoStats { status: u16, message: String },

    #[error("Plugin not found: {query}")]
    PluginNotFound { query: String },

    #[error("Interpreter error: {message}")]
    Interpreter { message: String },

    #[error("Installer exited with {}", describe_exit(.code))]
    InstallFailed { code: Option<i32> },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Config key not found: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid config value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("Home directory not found")]
    HomeNotFound,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpluginError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl RpluginError {
    /// Short class name shown in collapsed tree nodes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogUnavailable { .. } => "CatalogUnavailable",
            Self::MirrorStatus { .. } => "MirrorStatus",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::PackageFetch { .. } => "PackageFetch",
            Self::RepoStats { .. } => "RepoStats",
            Self::PluginNotFound { .. } => "PluginNotFound",
            Self::Interpreter { .. } => "Interpreter",
            Self::InstallFailed { .. } => "InstallFailed",
            Self::ConfigParse { .. } => "ConfigParse",
            Self::ConfigKeyNotFound { .. } => "ConfigKeyNotFound",
            Self::ConfigValue { .. } => "ConfigValue",
            Self::HomeNotFound => "HomeNotFound",
            Self::Http(_) => "Http",
            Self::Json(_) => "Json",
            Self::Io(_) => "Io",
        }
    }

    /// Whether a package-index fetch failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PackageNotFound { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CatalogUnavailable { .. } => 2,
            Self::PluginNotFound { .. } => 3,
            Self::PackageNotFound { .. } => 4,
            Self::InstallFailed { .. } => 5,
            Self::ConfigParse { .. } | Self::ConfigKeyNotFound { .. } | Self::ConfigValue { .. } => 6,
            _ => 1,
        }
    }
}
