use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RpluginError};

const CONFIG_FILE: &str = "config.toml";
const BASE_DIR_NAME: &str = ".nb-rplugin";

/// Mirrors serving the NoneBot plugin store (`plugins.json`)
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://v2.nonebot.dev/plugins.json",
    "https://raw.fastgit.org/nonebot/nonebot2/master/website/static/plugins.json",
    "https://cdn.jsdelivr.net/gh/nonebot/nonebot2/website/static/plugins.json",
];

pub const DEFAULT_PYPI_URL: &str = "https://pypi.org/pypi";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# nb-rplugin configuration file
# Location: ~/.nb-rplugin/config.toml

[registry]
# Plugin store mirrors, raced against each other; the first valid answer wins
mirrors = [
    "https://v2.nonebot.dev/plugins.json",
    "https://raw.fastgit.org/nonebot/nonebot2/master/website/static/plugins.json",
    "https://cdn.jsdelivr.net/gh/nonebot/nonebot2/website/static/plugins.json",
]
# Maximum concurrent mirror requests
max_workers = 5
# Per-request timeout in seconds
timeout_secs = 10

[index]
pypi_url = "https://pypi.org/pypi"
github_api_url = "https://api.github.com"
# Per-request timeout in seconds for PyPI and GitHub
timeout_secs = 10
# Attempts per package metadata lookup (404 is never retried)
retry_attempts = 3
retry_backoff_ms = 300

[project]
# Interpreter of the bot project. Empty: use the project's .venv, then `python`
python = ""

[tree]
max_depth = 16
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Plugin store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Package index (PyPI) and GitHub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_pypi_url")]
    pub pypi_url: String,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Empty means auto-detect
    #[serde(default)]
    pub python: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_mirrors() -> Vec<String> {
    DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect()
}

fn default_max_workers() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_pypi_url() -> String {
    DEFAULT_PYPI_URL.to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    300
}

fn default_max_depth() -> usize {
    16
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            max_workers: default_max_workers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pypi_url: default_pypi_url(),
            github_api_url: default_github_api_url(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// `~/.nb-rplugin`
pub fn default_base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(BASE_DIR_NAME))
        .ok_or(RpluginError::HomeNotFound)
}

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| RpluginError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| RpluginError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Interpreter override, `None` when auto-detection should be used
    pub fn python_override(&self) -> Option<PathBuf> {
        let python = self.project.python.trim();
        if python.is_empty() {
            None
        } else {
            Some(PathBuf::from(python))
        }
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "registry.mirrors" => self.registry.mirrors = parse_string_list(value)?,
            "registry.max_workers" => self.registry.max_workers = parse_number(key, value)?,
            "registry.timeout_secs" => self.registry.timeout_secs = parse_number(key, value)?,
            "index.pypi_url" => self.index.pypi_url = value.trim().to_string(),
            "index.github_api_url" => self.index.github_api_url = value.trim().to_string(),
            "index.timeout_secs" => self.index.timeout_secs = parse_number(key, value)?,
            "index.retry_attempts" => self.index.retry_attempts = parse_number(key, value)?,
            "index.retry_backoff_ms" => self.index.retry_backoff_ms = parse_number(key, value)?,
            "project.python" => self.project.python = value.trim().to_string(),
            "tree.max_depth" => self.tree.max_depth = parse_number(key, value)?,
            _ => {
                return Err(RpluginError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            (
                "registry.mirrors".to_string(),
                format!("{:?}", self.registry.mirrors),
            ),
            (
                "registry.max_workers".to_string(),
                self.registry.max_workers.to_string(),
            ),
            (
                "registry.timeout_secs".to_string(),
                self.registry.timeout_secs.to_string(),
            ),
            ("index.pypi_url".to_string(), self.index.pypi_url.clone()),
            (
                "index.github_api_url".to_string(),
                self.index.github_api_url.clone(),
            ),
            (
                "index.timeout_secs".to_string(),
                self.index.timeout_secs.to_string(),
            ),
            (
                "index.retry_attempts".to_string(),
                self.index.retry_attempts.to_string(),
            ),
            (
                "index.retry_backoff_ms".to_string(),
                self.index.retry_backoff_ms.to_string(),
            ),
            ("project.python".to_string(), self.project.python.clone()),
            ("tree.max_depth".to_string(), self.tree.max_depth.to_string()),
        ]
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| RpluginError::ConfigValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Parse a comma-separated or JSON-like list string
fn parse_string_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    let inner = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    Ok(inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_list_comma() {
        let result = parse_string_list("https://a/plugins.json,https://b/plugins.json").unwrap();
        assert_eq!(result, vec!["https://a/plugins.json", "https://b/plugins.json"]);
    }

    #[test]
    fn test_parse_string_list_json() {
        let result = parse_string_list(r#"["https://a", "https://b"]"#).unwrap();
        assert_eq!(result, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_parse_string_list_empty() {
        assert!(parse_string_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.registry.mirrors.len(), 3);
        assert_eq!(config.registry.max_workers, 5);
        assert_eq!(config.index.retry_attempts, 3);
        assert_eq!(config.index.pypi_url, "https://pypi.org/pypi");
        assert!(config.python_override().is_none());
    }

    #[test]
    fn test_config_get_set() {
        let mut config = Config::default();

        config.set("index.retry_attempts", "5").unwrap();
        assert_eq!(config.index.retry_attempts, 5);
        assert_eq!(config.get("index.retry_attempts").unwrap(), "5");

        config.set("index.timeout_secs", "30").unwrap();
        assert_eq!(config.index.timeout(), Duration::from_secs(30));
        assert_eq!(config.registry.timeout(), Duration::from_secs(10));

        config.set("project.python", "/opt/bot/.venv/bin/python").unwrap();
        assert_eq!(
            config.python_override(),
            Some(PathBuf::from("/opt/bot/.venv/bin/python"))
        );
    }

    #[test]
    fn test_set_rejects_unknown_key_and_bad_number() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("registry.nope", "1"),
            Err(RpluginError::ConfigKeyNotFound { .. })
        ));
        assert!(matches!(
            config.set("tree.max_depth", "deep"),
            Err(RpluginError::ConfigValue { .. })
        ));
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Config::init(temp.path()).unwrap();
        assert!(path.exists());

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.registry.mirrors, default_mirrors());
        assert_eq!(config.tree.max_depth, 16);
    }

    #[test]
    fn test_save_and_load_roundtrip_partial_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "[index]\nretry_attempts = 7\n",
        )
        .unwrap();

        let mut config = Config::load(temp.path()).unwrap();
        assert_eq!(config.index.retry_attempts, 7);
        assert_eq!(config.index.retry_backoff_ms, 300);

        config.tree.max_depth = 4;
        config.save(temp.path()).unwrap();
        assert_eq!(Config::load(temp.path()).unwrap().tree.max_depth, 4);
    }

    #[test]
    fn test_default_base_dir() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(default_base_dir().unwrap(), home.join(".nb-rplugin"));
        }
    }
}
