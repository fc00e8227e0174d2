//! Catalog queries
//!
//! Search, lookup and pagination over a fetched plugin store snapshot.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, RpluginError};
use crate::plugin::types::{Plugin, SearchField};

static REPO_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/([a-zA-Z0-9_-]+/[a-zA-Z0-9_.-]+?)(?:\.git)?/?$")
        .expect("repository regex is valid")
});

/// Search plugins by substring over name, module name, description and package
pub fn search_plugins<'a>(plugins: &'a [Plugin], query: &str) -> Vec<&'a Plugin> {
    let query_lower = query.to_lowercase();

    plugins
        .iter()
        .filter(|p| matches_query(p, &query_lower))
        .collect()
}

/// Check if a plugin matches a (lowercased) search query
fn matches_query(plugin: &Plugin, query: &str) -> bool {
    SearchField::ALL
        .iter()
        .any(|field| plugin.field(*field).to_lowercase().contains(query))
}

/// Find a plugin by name, preferring an exact match over a substring match
pub fn get_plugin_by_name<'a>(plugins: &'a [Plugin], name: &str) -> Result<&'a Plugin> {
    let exact = plugins.iter().find(|p| {
        [
            SearchField::Name,
            SearchField::ModuleName,
            SearchField::ProjectLink,
        ]
        .iter()
        .any(|field| p.field(*field) == name)
    });

    if let Some(plugin) = exact {
        return Ok(plugin);
    }

    search_plugins(plugins, name)
        .into_iter()
        .next()
        .ok_or_else(|| RpluginError::PluginNotFound {
            query: name.to_string(),
        })
}

/// One page of a plugin listing
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub items: &'a [Plugin],
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
}

impl Page<'_> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Slice `plugins` into pages of `count` and return page `page` (1-based, clamped)
pub fn paginate(plugins: &[Plugin], count: usize, page: usize) -> Page<'_> {
    let count = count.max(1);
    let total_pages = plugins.len().div_ceil(count).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * count;
    let end = (start + count).min(plugins.len());

    Page {
        items: &plugins[start.min(plugins.len())..end],
        page,
        total_pages,
    }
}

/// Extract `owner/repo` from a GitHub homepage URL
pub fn repo_from_homepage(homepage: &str) -> Option<&str> {
    REPO_REGEX
        .captures(homepage)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Split the project's plugin module names into catalog entries and unknown names.
///
/// Local plugins and plugins not published to the store end up in the second list.
pub fn resolve_project_plugins(catalog: &[Plugin], modules: &[String]) -> (Vec<Plugin>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for module in modules {
        match catalog.iter().find(|p| p.module_name == *module) {
            Some(plugin) => found.push(plugin.clone()),
            None => missing.push(module.clone()),
        }
    }

    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(name: &str, module_name: &str, project_link: &str, desc: &str) -> Plugin {
        Plugin {
            module_name: module_name.to_string(),
            project_link: project_link.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            author: "someone".to_string(),
            homepage: format!("https://github.com/someone/{}", project_link),
            tags: Vec::new(),
            is_official: false,
        }
    }

    fn catalog() -> Vec<Plugin> {
        vec![
            plugin(
                "status",
                "nonebot_plugin_status_extra",
                "nonebot-plugin-status-extra",
                "extended server status",
            ),
            plugin(
                "Status",
                "nonebot_plugin_status",
                "nonebot-plugin-status",
                "server status",
            ),
            plugin(
                "apscheduler",
                "nonebot_plugin_apscheduler",
                "nonebot-plugin-apscheduler",
                "scheduled jobs",
            ),
        ]
    }

    #[test]
    fn test_search_matches_any_searchable_field() {
        let plugins = catalog();

        let by_desc = search_plugins(&plugins, "SCHEDULED");
        assert_eq!(by_desc.len(), 1);
        assert_eq!(by_desc[0].name, "apscheduler");

        let by_module = search_plugins(&plugins, "plugin_status");
        assert_eq!(by_module.len(), 2);
    }

    #[test]
    fn test_search_ignores_author() {
        let plugins = catalog();
        assert!(search_plugins(&plugins, "someone").is_empty());
    }

    #[test]
    fn test_get_plugin_prefers_exact_match() {
        let plugins = catalog();

        // "nonebot-plugin-status" is a substring of the first entry's project link,
        // but the second entry matches exactly.
        let found = get_plugin_by_name(&plugins, "nonebot-plugin-status").unwrap();
        assert_eq!(found.module_name, "nonebot_plugin_status");

        let found = get_plugin_by_name(&plugins, "nonebot_plugin_status").unwrap();
        assert_eq!(found.project_link, "nonebot-plugin-status");
    }

    #[test]
    fn test_get_plugin_falls_back_to_substring() {
        let plugins = catalog();
        let found = get_plugin_by_name(&plugins, "apsched").unwrap();
        assert_eq!(found.project_link, "nonebot-plugin-apscheduler");
    }

    #[test]
    fn test_get_plugin_not_found() {
        let plugins = catalog();
        let err = get_plugin_by_name(&plugins, "does-not-exist").unwrap_err();
        assert!(matches!(err, RpluginError::PluginNotFound { .. }));
    }

    #[test]
    fn test_paginate() {
        let plugins = catalog();

        let first = paginate(&plugins, 2, 1);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next());

        let last = paginate(&plugins, 2, 2);
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_next());

        let clamped = paginate(&plugins, 2, 9);
        assert_eq!(clamped.page, 2);

        let empty = paginate(&[], 10, 1);
        assert!(empty.items.is_empty());
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn test_repo_from_homepage() {
        assert_eq!(
            repo_from_homepage("https://github.com/nonebot/plugin-alconna"),
            Some("nonebot/plugin-alconna")
        );
        assert_eq!(
            repo_from_homepage("https://github.com/owner/repo.git"),
            Some("owner/repo")
        );
        assert_eq!(repo_from_homepage("https://gitee.com/owner/repo"), None);
        assert_eq!(
            repo_from_homepage("https://github.com/owner/repo/tree/main"),
            None
        );
    }

    #[test]
    fn test_resolve_project_plugins() {
        let plugins = catalog();
        let modules = vec![
            "nonebot_plugin_apscheduler".to_string(),
            "src.plugins.local".to_string(),
            "nonebot_plugin_status".to_string(),
        ];

        let (found, missing) = resolve_project_plugins(&plugins, &modules);
        let links: Vec<&str> = found.iter().map(|p| p.project_link.as_str()).collect();
        assert_eq!(links, vec!["nonebot-plugin-apscheduler", "nonebot-plugin-status"]);
        assert_eq!(missing, vec!["src.plugins.local"]);
    }
}
