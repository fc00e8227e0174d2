use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "nb-rplugin")]
#[command(about = "Browse, inspect and install NoneBot plugins")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.nb-rplugin)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List plugins in the store
    List {
        /// Plugins per page
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Page to show (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Search plugins by name, module, description or package
    Search {
        /// Search query (case-insensitive substring)
        query: String,

        /// Plugins per page
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Page to show (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Show details of a plugin
    Info {
        /// Plugin name, module name or package name
        name: String,

        /// Project directory used for the installed version (default: current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Install a plugin into the project's environment
    Install {
        /// Plugin name, module name or package name
        name: String,

        /// Project directory (default: current directory)
        #[arg(long)]
        project: Option<PathBuf>,

        /// Extra arguments passed to pip (after `--`)
        #[arg(last = true)]
        pip_args: Vec<String>,
    },

    /// Show the dependency tree of the project's plugins
    Tree {
        /// Project directory (default: current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., registry.max_workers)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., index.retry_attempts)
        key: String,

        /// Value to set (lists: "a,b" or "[a, b]")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_collects_pip_args() {
        let cli = Cli::parse_from([
            "nb-rplugin",
            "install",
            "status",
            "--",
            "--upgrade",
            "-i",
            "https://mirror.example/simple",
        ]);
        match cli.command {
            Some(Commands::Install { name, pip_args, .. }) => {
                assert_eq!(name, "status");
                assert_eq!(
                    pip_args,
                    vec!["--upgrade", "-i", "https://mirror.example/simple"]
                );
            }
            _ => panic!("expected install command"),
        }
    }

    #[test]
    fn test_paging_defaults() {
        let cli = Cli::parse_from(["nb-rplugin", "search", "status", "-p", "2"]);
        match cli.command {
            Some(Commands::Search { query, count, page }) => {
                assert_eq!(query, "status");
                assert_eq!(count, 10);
                assert_eq!(page, 2);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_info_takes_project_dir() {
        let cli = Cli::parse_from(["nb-rplugin", "info", "status", "--project", "../my-bot"]);
        match cli.command {
            Some(Commands::Info { name, project }) => {
                assert_eq!(name, "status");
                assert_eq!(project, Some(PathBuf::from("../my-bot")));
            }
            _ => panic!("expected info command"),
        }
    }
}
