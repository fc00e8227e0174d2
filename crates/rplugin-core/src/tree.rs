//! Dependency tree of installed plugins
//!
//! Starting from the project's plugins, each plugin's `requires_dist` is
//! matched back against the store catalog and expanded recursively. All
//! metadata lookups of one tree level run concurrently; a failed lookup
//! collapses its parent into a single error leaf.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, try_join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::environment::{normalize_name, VersionLookup};
use crate::plugin::index::PackageIndexClient;
use crate::plugin::registry::RegistryClient;
use crate::plugin::types::{PackageMetadata, Plugin};
use crate::Result;

/// Terminal color of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeColor {
    Plain,
    BrightCyan,
    BrightYellow,
    Green,
    Red,
}

/// Colors cycled by depth
pub const PALETTE: [TreeColor; 3] = [
    TreeColor::BrightCyan,
    TreeColor::BrightYellow,
    TreeColor::Green,
];

impl TreeColor {
    pub fn for_depth(depth: usize) -> Self {
        PALETTE[depth % PALETTE.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Tree root, labeled with the project name
    Project,
    Plugin,
    /// Already expanded on the path from the root
    Cycle,
    /// Collapsed subtree after a failed metadata lookup
    Error,
    /// Has store dependencies that were not expanded because of the depth limit
    Truncated,
}

/// Installed version compared with the latest one on the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    /// No index metadata
    Unknown,
    NotInstalled,
    UpToDate,
    UpgradeAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub label: String,
    pub color: TreeColor,
    pub kind: NodeKind,
    pub project_link: String,
    /// Latest version on the package index
    pub declared_version: Option<String>,
    /// Version in the project's environment
    pub installed_version: Option<String>,
    pub depth: usize,
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn version_state(&self) -> VersionState {
        match (&self.declared_version, &self.installed_version) {
            (None, _) => VersionState::Unknown,
            (Some(_), None) => VersionState::NotInstalled,
            (Some(declared), Some(installed)) if declared == installed => VersionState::UpToDate,
            (Some(_), Some(_)) => VersionState::UpgradeAvailable,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn leaf(plugin: &Plugin, kind: NodeKind, label: String, depth: usize) -> Self {
        Self {
            label,
            color: if kind == NodeKind::Error {
                TreeColor::Red
            } else {
                TreeColor::for_depth(depth)
            },
            kind,
            project_link: plugin.project_link.clone(),
            declared_version: None,
            installed_version: None,
            depth,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTree {
    pub root: DependencyNode,
}

impl DependencyTree {
    fn new(project_name: &str, children: Vec<DependencyNode>) -> Self {
        Self {
            root: DependencyNode {
                label: project_name.to_string(),
                color: TreeColor::Plain,
                kind: NodeKind::Project,
                project_link: project_name.to_string(),
                declared_version: None,
                installed_version: None,
                depth: 0,
                children,
            },
        }
    }
}

/// Distribution name at the start of a requirement string.
///
/// `nonebot2 (>=2.0.0)`, `nonebot2>=2.0.0` and `httpx[http2]; extra == "x"`
/// all yield the bare name.
pub fn dependency_name(requirement: &str) -> Option<&str> {
    let requirement = requirement.trim_start();
    let end = requirement
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(requirement.len());
    let name = &requirement[..end];
    (!name.is_empty()).then_some(name)
}

/// Node label: package, version annotation and (top level only) description
pub fn format_label(
    project_link: &str,
    declared: Option<&str>,
    installed: Option<&str>,
    description: Option<&str>,
) -> String {
    let mut label = project_link.to_string();

    match (declared, installed) {
        (Some(declared), Some(installed)) if declared != installed => {
            label.push_str(&format!(" ({} {}⬆️)", installed, declared));
        }
        (Some(declared), _) => label.push_str(&format!(" ({})", declared)),
        (None, _) => {}
    }

    if let Some(description) = description {
        label.push(' ');
        label.push_str(description);
    }

    label
}

/// Catalog entries keyed by normalized package name
struct CatalogIndex<'c> {
    by_link: HashMap<String, &'c Plugin>,
}

impl<'c> CatalogIndex<'c> {
    fn new(catalog: &'c [Plugin]) -> Self {
        Self {
            by_link: catalog
                .iter()
                .map(|p| (normalize_name(&p.project_link), p))
                .collect(),
        }
    }

    /// Store plugins required by `metadata`, in requirement order.
    ///
    /// A package listed more than once (e.g. under different environment
    /// markers) yields a single child at its first position.
    fn dependencies(&self, metadata: &PackageMetadata) -> Vec<&'c Plugin> {
        let mut found: Vec<&'c Plugin> = Vec::new();
        for requirement in &metadata.requires_dist {
            let Some(name) = dependency_name(requirement) else {
                continue;
            };
            if let Some(&plugin) = self.by_link.get(&normalize_name(name)) {
                if !found.iter().any(|p| p.project_link == plugin.project_link) {
                    found.push(plugin);
                }
            }
        }
        found
    }
}

enum Slot<'c> {
    Expand(&'c Plugin),
    Cycle(&'c Plugin),
}

impl<'c> Slot<'c> {
    fn plugin(&self) -> &'c Plugin {
        match *self {
            Slot::Expand(plugin) | Slot::Cycle(plugin) => plugin,
        }
    }
}

pub struct TreeBuilder<'a> {
    registry: &'a RegistryClient,
    index: &'a PackageIndexClient,
    versions: &'a dyn VersionLookup,
    retry_attempts: u32,
    max_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        registry: &'a RegistryClient,
        index: &'a PackageIndexClient,
        versions: &'a dyn VersionLookup,
    ) -> Self {
        Self {
            registry,
            index,
            versions,
            retry_attempts: 3,
            max_depth: 16,
        }
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Deepest level whose dependencies are still expanded
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build the tree for `plugins` under a root labeled `project_name`.
    ///
    /// Only an unavailable catalog is fatal; lookup failures are rendered
    /// into the tree.
    pub async fn build_tree(&self, project_name: &str, plugins: &[Plugin]) -> Result<DependencyTree> {
        let catalog = self.registry.get_plugins().await?;
        let catalog_index = CatalogIndex::new(&catalog);

        let roots = plugins.iter().map(|plugin| {
            let catalog_index = &catalog_index;
            async move {
                let (metadata, installed) = futures::join!(
                    self.root_metadata(plugin),
                    self.versions.installed_version(&plugin.module_name)
                );
                self.build_node(catalog_index, plugin, metadata, installed, 0, Vec::new())
                    .await
            }
        });

        let children = join_all(roots).await;
        Ok(DependencyTree::new(project_name, children))
    }

    async fn root_metadata(&self, plugin: &Plugin) -> Option<Arc<PackageMetadata>> {
        match self
            .index
            .get_package_metadata_retry(&plugin.project_link, self.retry_attempts)
            .await
        {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(package = %plugin.project_link, error = %e, "no index metadata for plugin");
                None
            }
        }
    }

    async fn fetch_dependency(&self, plugin: &Plugin) -> Result<(Arc<PackageMetadata>, Option<String>)> {
        let (metadata, installed) = futures::join!(
            self.index
                .get_package_metadata_retry(&plugin.project_link, self.retry_attempts),
            self.versions.installed_version(&plugin.module_name)
        );
        Ok((metadata?, installed))
    }

    fn build_node<'b>(
        &'b self,
        catalog: &'b CatalogIndex<'b>,
        plugin: &'b Plugin,
        metadata: Option<Arc<PackageMetadata>>,
        installed: Option<String>,
        depth: usize,
        ancestors: Vec<String>,
    ) -> BoxFuture<'b, DependencyNode> {
        async move {
            let Some(metadata) = metadata else {
                return DependencyNode::leaf(
                    plugin,
                    NodeKind::Plugin,
                    plugin.project_link.clone(),
                    depth,
                );
            };

            let mut path = ancestors;
            path.push(normalize_name(&plugin.project_link));

            let dependencies = catalog.dependencies(&metadata);
            let truncated = depth >= self.max_depth && !dependencies.is_empty();
            let slots: Vec<Slot<'b>> = if truncated {
                debug!(package = %plugin.project_link, depth, "depth limit reached");
                Vec::new()
            } else {
                dependencies
                    .into_iter()
                    .map(|dep| {
                        if path.contains(&normalize_name(&dep.project_link)) {
                            Slot::Cycle(dep)
                        } else {
                            Slot::Expand(dep)
                        }
                    })
                    .collect()
            };

            let fetches = slots.iter().map(|slot| async move {
                match slot {
                    Slot::Expand(dep) => self.fetch_dependency(dep).await.map(Some),
                    Slot::Cycle(_) => Ok(None),
                }
            });

            let fetched = match try_join_all(fetches).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(package = %plugin.project_link, error = %e, "dependency lookup failed");
                    let label = format!("{} [{}] {}", plugin.project_link, e.kind(), e);
                    return DependencyNode::leaf(plugin, NodeKind::Error, label, depth);
                }
            };

            // Cycle slots are the only ones without a fetch result
            let children = slots.iter().zip(fetched).map(|(slot, fetched)| {
                let dep = slot.plugin();
                match fetched {
                    Some((dep_metadata, dep_installed)) => self.build_node(
                        catalog,
                        dep,
                        Some(dep_metadata),
                        dep_installed,
                        depth + 1,
                        path.clone(),
                    ),
                    None => {
                        let label = format!("{} (cycle)", dep.project_link);
                        let leaf = DependencyNode::leaf(dep, NodeKind::Cycle, label, depth + 1);
                        futures::future::ready(leaf).boxed()
                    }
                }
            });
            let children = join_all(children).await;

            let description = (depth == 0).then_some(plugin.desc.as_str());
            let mut label = format_label(
                &plugin.project_link,
                Some(&metadata.version),
                installed.as_deref(),
                description,
            );
            if truncated {
                label.push_str(" (…)");
            }

            DependencyNode {
                label,
                color: TreeColor::for_depth(depth),
                kind: if truncated {
                    NodeKind::Truncated
                } else {
                    NodeKind::Plugin
                },
                project_link: plugin.project_link.clone(),
                declared_version: Some(metadata.version.clone()),
                installed_version: installed,
                depth,
                children,
            }
        }
        .boxed()
    }
}
