pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod installer;
pub mod plugin;
pub mod project;
pub mod tree;

pub use config::{Config, IndexConfig, ProjectConfig, RegistryConfig, TreeConfig};
pub use environment::{normalize_name, EnvironmentResolver, VersionLookup};
pub use error::{Result, RpluginError};
pub use http::build_client;
pub use installer::PipInstaller;
pub use plugin::{
    get_plugin_by_name, paginate, repo_from_homepage, resolve_project_plugins, search_plugins,
    PackageIndexClient, PackageMetadata, Page, Plugin, RegistryClient, RepoStatistics,
    SearchField,
};
pub use project::{resolve_python, Project};
pub use tree::{
    DependencyNode, DependencyTree, NodeKind, TreeBuilder, TreeColor, VersionState,
};
