//! Plugin Module
//!
//! - `types`: store entries and package index records
//! - `registry`: plugin store client racing several mirrors
//! - `index`: package metadata and repository statistics
//! - `catalog`: search, lookup and pagination over a store snapshot

pub mod catalog;
pub mod index;
pub mod registry;
pub mod types;

// Re-exports
pub use catalog::{
    get_plugin_by_name, paginate, repo_from_homepage, resolve_project_plugins, search_plugins, Page,
};
pub use index::PackageIndexClient;
pub use registry::RegistryClient;
pub use types::{License, PackageMetadata, Plugin, RepoStatistics, SearchField, Tag};
