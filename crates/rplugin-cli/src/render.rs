//! Terminal output: plugin cards, listing pages and the dependency tree

use colored::{Color, ColoredString, Colorize};

use rplugin_core::plugin::{repo_from_homepage, Page, PackageMetadata, Plugin, RepoStatistics};
use rplugin_core::tree::{DependencyNode, DependencyTree, NodeKind, TreeColor, VersionState};

const CARD_WIDTH: usize = 60;

fn terminal_color(color: TreeColor) -> Option<Color> {
    match color {
        TreeColor::Plain => None,
        TreeColor::BrightCyan => Some(Color::BrightCyan),
        TreeColor::BrightYellow => Some(Color::BrightYellow),
        TreeColor::Green => Some(Color::Green),
        TreeColor::Red => Some(Color::Red),
    }
}

fn tag_color(color: &str) -> Color {
    // Store tags carry `#rrggbb`; anything else falls back to the default
    let hex = color.trim_start_matches('#');
    if hex.len() == 6 {
        if let Ok(rgb) = u32::from_str_radix(hex, 16) {
            return Color::TrueColor {
                r: (rgb >> 16) as u8,
                g: (rgb >> 8) as u8,
                b: rgb as u8,
            };
        }
    }
    Color::White
}

/// Card title: display name, marked when the plugin is official
pub fn card_title(plugin: &Plugin) -> String {
    if plugin.is_official {
        format!("{} ✅", plugin.name)
    } else {
        plugin.name.clone()
    }
}

/// Homepage shown as `owner/repo` when it points at GitHub
pub fn short_homepage(homepage: &str) -> &str {
    repo_from_homepage(homepage).unwrap_or(homepage)
}

pub fn print_plugin_card(plugin: &Plugin) {
    let rule = "─".repeat(CARD_WIDTH);
    println!("{}", rule.dimmed());
    println!(
        "{}  {}",
        card_title(plugin).blue().bold(),
        plugin.module_name.dimmed()
    );
    println!("{}", plugin.desc);

    if !plugin.tags.is_empty() {
        let tags: Vec<String> = plugin
            .tags
            .iter()
            .map(|t| format!(" {} ", t.label).on_color(tag_color(&t.color)).to_string())
            .collect();
        println!("{}", tags.join(" "));
    }

    println!();
    println!("{} {}", "Author:".magenta(), plugin.author);
    println!("{} {}", "Package:".yellow().bold(), plugin.project_link);
    println!(
        "{} {}",
        "Homepage:".dimmed(),
        short_homepage(&plugin.homepage).underline()
    );
}

pub fn print_page(title: &str, page: &Page<'_>) {
    println!();
    println!(
        "{}",
        format!("{} ({}/{})", title, page.page, page.total_pages)
            .red()
            .bold()
    );

    if page.items.is_empty() {
        println!("No plugins found");
        return;
    }

    for plugin in page.items {
        print_plugin_card(plugin);
    }
    println!("{}", "─".repeat(CARD_WIDTH).dimmed());

    if page.has_next() {
        println!(
            "{}",
            format!("Next page: --page {}", page.page + 1).dimmed()
        );
    }
}

/// Plugin card followed by index metadata and repository statistics.
///
/// Either extra section is skipped when it could not be fetched.
pub fn print_info(
    plugin: &Plugin,
    metadata: Option<&PackageMetadata>,
    installed: Option<&str>,
    stats: Option<&RepoStatistics>,
) {
    print_plugin_card(plugin);
    println!();

    if let Some(metadata) = metadata {
        println!("{} {}", "Latest:".cyan(), metadata.version);
        if let Some(requires_python) = &metadata.requires_python {
            println!("{} {}", "Python:".cyan(), requires_python);
        }
        if let Some(keywords) = metadata.keywords.as_deref().filter(|k| !k.is_empty()) {
            println!("{} {}", "Keywords:".cyan(), keywords);
        }
        if !metadata.requires_dist.is_empty() {
            println!("{}", "Requires:".cyan());
            for requirement in &metadata.requires_dist {
                println!("  {}", requirement);
            }
        }
    }

    match installed {
        Some(version) => println!("{} {}", "Installed:".green(), version),
        None => println!("{} {}", "Installed:".green(), "no".dimmed()),
    }

    if let Some(stats) = stats {
        println!();
        println!(
            "★ {}  Issues {}  Forks {}",
            stats.stargazers_count.to_string().yellow(),
            stats.open_issues_count,
            stats.forks_count
        );
        if let Some(license) = &stats.license {
            let name = license.spdx_id.as_deref().unwrap_or(&license.name);
            println!("{} {}", "License:".cyan(), name);
        }
    }
}

fn paint_node(node: &DependencyNode) -> String {
    let label: ColoredString = match terminal_color(node.color) {
        Some(color) => node.label.color(color),
        None => node.label.bold(),
    };

    match (node.kind, node.version_state()) {
        (NodeKind::Cycle, _) => label.dimmed().to_string(),
        (_, VersionState::UpgradeAvailable) => label.bold().to_string(),
        _ => label.to_string(),
    }
}

fn walk(
    node: &DependencyNode,
    prefix: &str,
    lines: &mut Vec<String>,
    paint: &dyn Fn(&DependencyNode) -> String,
) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}", prefix, branch, paint(child)));

        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        walk(child, &next, lines, paint);
    }
}

fn tree_lines(tree: &DependencyTree, paint: &dyn Fn(&DependencyNode) -> String) -> Vec<String> {
    let mut lines = vec![paint(&tree.root)];
    walk(&tree.root, "", &mut lines, paint);
    lines
}

pub fn print_tree(tree: &DependencyTree) {
    for line in tree_lines(tree, &paint_node) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(label: &str, depth: usize, children: Vec<DependencyNode>) -> DependencyNode {
        DependencyNode {
            label: label.to_string(),
            color: TreeColor::for_depth(depth),
            kind: NodeKind::Plugin,
            project_link: label.to_string(),
            declared_version: None,
            installed_version: None,
            depth,
            children,
        }
    }

    #[test]
    fn test_tree_lines_connectors() {
        let tree = DependencyTree {
            root: DependencyNode {
                kind: NodeKind::Project,
                color: TreeColor::Plain,
                ..node(
                    "bot",
                    0,
                    vec![
                        node("a", 0, vec![node("a1", 1, vec![]), node("a2", 1, vec![])]),
                        node("b", 0, vec![node("b1", 1, vec![])]),
                    ],
                )
            },
        };

        let lines = tree_lines(&tree, &|n: &DependencyNode| n.label.clone());
        assert_eq!(
            lines,
            vec![
                "bot",
                "├── a",
                "│   ├── a1",
                "│   └── a2",
                "└── b",
                "    └── b1",
            ]
        );
    }

    #[test]
    fn test_tag_color() {
        assert_eq!(
            tag_color("#ea5252"),
            Color::TrueColor {
                r: 0xea,
                g: 0x52,
                b: 0x52
            }
        );
        assert_eq!(tag_color("red"), Color::White);
    }

    #[test]
    fn test_short_homepage() {
        assert_eq!(
            short_homepage("https://github.com/nonebot/plugin-alconna"),
            "nonebot/plugin-alconna"
        );
        assert_eq!(
            short_homepage("https://example.com/plugin"),
            "https://example.com/plugin"
        );
    }
}
