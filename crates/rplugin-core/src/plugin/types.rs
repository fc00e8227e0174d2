//! NoneBot plugin store and package index type definitions

use serde::{Deserialize, Deserializer, Serialize};

/// Colored label attached to a store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
    pub color: String,
}

/// Plugin store entry (one record of `plugins.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Import name, unique within a catalog snapshot
    pub module_name: String,
    /// Distribution name on the package index
    pub project_link: String,
    /// Display name
    pub name: String,
    pub desc: String,
    pub author: String,
    pub homepage: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub is_official: bool,
}

/// Fields of a [`Plugin`] that take part in catalog search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    ModuleName,
    Desc,
    ProjectLink,
}

impl SearchField {
    pub const ALL: [SearchField; 4] = [
        SearchField::Name,
        SearchField::ModuleName,
        SearchField::Desc,
        SearchField::ProjectLink,
    ];
}

impl Plugin {
    pub fn field(&self, field: SearchField) -> &str {
        match field {
            SearchField::Name => &self.name,
            SearchField::ModuleName => &self.module_name,
            SearchField::Desc => &self.desc,
            SearchField::ProjectLink => &self.project_link,
        }
    }
}

/// `info` section of `https://pypi.org/pypi/{package}/json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub version: String,
    /// Raw requirement strings, e.g. `nonebot2 (>=2.0.0)`
    #[serde(default, deserialize_with = "null_as_default")]
    pub requires_dist: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_content_type: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub requires_python: Option<String>,
}

/// Repository license as reported by GitHub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(default)]
    pub spdx_id: Option<String>,
}

/// Subset of `https://api.github.com/repos/{owner}/{repo}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatistics {
    pub stargazers_count: u64,
    pub open_issues_count: u64,
    pub forks_count: u64,
    #[serde(default)]
    pub license: Option<License>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
