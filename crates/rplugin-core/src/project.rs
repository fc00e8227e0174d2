//! Bot project discovery
//!
//! Reads the plugin list and project name from `pyproject.toml`
//! (`[tool.nonebot].plugins`) and locates the project's interpreter.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, RpluginError};

const PYPROJECT_FILE: &str = "pyproject.toml";
const VENV_DIRS: &[&str] = &[".venv", "venv"];

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<ProjectTable>,
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectTable {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    nonebot: Option<NoneBotTable>,
}

#[derive(Debug, Default, Deserialize)]
struct NoneBotTable {
    #[serde(default)]
    plugins: Vec<String>,
}

/// A NoneBot project on disk
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub name: String,
    /// Plugin module names in declaration order
    pub plugins: Vec<String>,
}

impl Project {
    /// Load project info from `root/pyproject.toml`; a missing file means no plugins
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PYPROJECT_FILE);
        let pyproject = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str::<PyProject>(&content).map_err(|e| RpluginError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            PyProject::default()
        };

        let name = pyproject
            .project
            .and_then(|p| p.name)
            .or_else(|| {
                root.canonicalize()
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            })
            .unwrap_or_else(|| "project".to_string());

        let plugins = pyproject
            .tool
            .and_then(|t| t.nonebot)
            .map(|n| n.plugins)
            .unwrap_or_default();

        Ok(Self {
            root: root.to_path_buf(),
            name,
            plugins,
        })
    }

    /// The project's virtualenv interpreter if one exists, otherwise `python`
    pub fn default_python(&self) -> PathBuf {
        detect_python(&self.root)
    }

    /// Interpreter to use: an explicit override wins over auto-detection
    pub fn python(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path.unwrap_or_else(|| self.default_python())
    }
}

/// Interpreter for `root` without requiring a readable `pyproject.toml`.
///
/// Used where the project is only needed for installed-version lookups.
pub fn resolve_python(root: &Path, override_path: Option<PathBuf>) -> PathBuf {
    match Project::load(root) {
        Ok(project) => project.python(override_path),
        Err(e) => {
            warn!(root = %root.display(), error = %e, "ignoring unreadable project file");
            override_path.unwrap_or_else(|| detect_python(root))
        }
    }
}

fn detect_python(root: &Path) -> PathBuf {
    VENV_DIRS
        .iter()
        .map(|dir| venv_python(&root.join(dir)))
        .find(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from("python"))
}

fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}
