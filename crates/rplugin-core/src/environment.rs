//! Installed package lookup for the bot project's Python environment
//!
//! The bot usually runs from its own virtualenv, not from whatever Python
//! happens to be on `PATH`. The project's interpreter is asked once for its
//! `sys.path`, and the distributions found there are indexed by normalized
//! name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, RpluginError};

const SYS_PATH_SCRIPT: &str = "import sys,json;print(json.dumps(sys.path[1:]))";

/// Source of installed versions, keyed by module or distribution name
#[async_trait]
pub trait VersionLookup: Send + Sync {
    /// Installed version, `None` when the package is not installed
    async fn installed_version(&self, name: &str) -> Option<String>;
}

/// Normalize a distribution name (PEP 503): lowercase, `-_.` runs become `-`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            in_separator = true;
            continue;
        }
        if in_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        in_separator = false;
        normalized.extend(c.to_lowercase());
    }

    normalized
}

/// Resolver bound to one interpreter
pub struct EnvironmentResolver {
    python: PathBuf,
    /// normalized name -> version, built on first lookup
    index: OnceCell<HashMap<String, String>>,
}

impl EnvironmentResolver {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            index: OnceCell::new(),
        }
    }

    /// Resolver over known search paths, skipping the interpreter probe
    pub fn with_search_paths(paths: &[PathBuf]) -> Self {
        Self {
            python: PathBuf::new(),
            index: OnceCell::new_with(Some(scan_distributions(paths))),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    async fn index(&self) -> &HashMap<String, String> {
        self.index
            .get_or_init(|| async {
                match self.build_index().await {
                    Ok(index) => {
                        debug!(python = %self.python.display(), packages = index.len(), "environment indexed");
                        index
                    }
                    Err(e) => {
                        warn!(python = %self.python.display(), error = %e, "cannot inspect project environment");
                        HashMap::new()
                    }
                }
            })
            .await
    }

    async fn build_index(&self) -> Result<HashMap<String, String>> {
        let paths = probe_search_path(&self.python).await?;
        let index = tokio::task::spawn_blocking(move || scan_distributions(&paths))
            .await
            .map_err(|e| RpluginError::Interpreter {
                message: e.to_string(),
            })?;
        Ok(index)
    }
}

#[async_trait]
impl VersionLookup for EnvironmentResolver {
    async fn installed_version(&self, name: &str) -> Option<String> {
        self.index().await.get(&normalize_name(name)).cloned()
    }
}

/// Ask `python` for its module search path (minus the script directory)
pub async fn probe_search_path(python: &Path) -> Result<Vec<PathBuf>> {
    let output = Command::new(python)
        .args(["-W", "ignore", "-c", SYS_PATH_SCRIPT])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RpluginError::Interpreter {
            message: format!("failed to run {}: {}", python.display(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RpluginError::Interpreter {
            message: format!("{} exited with {}: {}", python.display(), output.status, stderr.trim()),
        });
    }

    parse_search_path(&output.stdout)
}

fn parse_search_path(stdout: &[u8]) -> Result<Vec<PathBuf>> {
    let text = String::from_utf8_lossy(stdout);
    let paths: Vec<String> = serde_json::from_str(text.trim())?;
    Ok(paths
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Index `*.dist-info` / `*.egg-info` entries found directly under `paths`.
///
/// Earlier paths win, matching import precedence.
pub fn scan_distributions(paths: &[PathBuf]) -> HashMap<String, String> {
    let mut index = HashMap::new();

    for dir in paths.iter().filter(|p| p.is_dir()) {
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file_name = entry.file_name().to_string_lossy();
            let Some((stem, metadata_file)) = distribution_entry(&file_name) else {
                continue;
            };

            let metadata_path = if entry.file_type().is_dir() {
                entry.path().join(metadata_file)
            } else {
                entry.path().to_path_buf()
            };

            let parsed = fs::read_to_string(&metadata_path)
                .ok()
                .and_then(|content| parse_metadata_headers(&content))
                .or_else(|| split_stem(stem));

            if let Some((name, version)) = parsed {
                index.entry(normalize_name(&name)).or_insert(version);
            }
        }
    }

    index
}

fn distribution_entry(file_name: &str) -> Option<(&str, &'static str)> {
    if let Some(stem) = file_name.strip_suffix(".dist-info") {
        Some((stem, "METADATA"))
    } else {
        file_name
            .strip_suffix(".egg-info")
            .map(|stem| (stem, "PKG-INFO"))
    }
}

/// `Name` and `Version` from the RFC 822 header block of a METADATA file
fn parse_metadata_headers(content: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Name:") {
            name.get_or_insert_with(|| value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Version:") {
            version.get_or_insert_with(|| value.trim().to_string());
        }
    }

    Some((name?, version?))
}

/// `nonebot_plugin_status-0.9.0` -> (`nonebot_plugin_status`, `0.9.0`)
fn split_stem(stem: &str) -> Option<(String, String)> {
    let (name, rest) = stem.split_once('-')?;
    let version = rest.split('-').next().unwrap_or(rest);
    Some((name.to_string(), version.to_string()))
}
