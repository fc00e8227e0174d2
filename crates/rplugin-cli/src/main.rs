use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use rplugin_core::config::{default_base_dir, Config};
use rplugin_core::environment::{EnvironmentResolver, VersionLookup};
use rplugin_core::installer::PipInstaller;
use rplugin_core::plugin::{
    get_plugin_by_name, paginate, repo_from_homepage, resolve_project_plugins, search_plugins,
    PackageIndexClient, Plugin, RegistryClient,
};
use rplugin_core::project::{resolve_python, Project};
use rplugin_core::tree::TreeBuilder;
use rplugin_core::{build_client, Result, RpluginError};

mod args;
mod render;
use args::{Cli, Commands, ConfigAction, Shell};

const STORE_TITLE: &str = "NoneBot Store";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match resolve_base_dir(cli.base_dir) {
        Ok(base_dir) => run(cli.command, &base_dir).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            if let RpluginError::CatalogUnavailable { errors } = &e {
                for error in errors {
                    eprintln!("  {} {}", "-".dimmed(), error);
                }
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(command: Option<Commands>, base_dir: &Path) -> Result<()> {
    match command {
        Some(Commands::List { count, page }) => handle_list(base_dir, count, page).await,
        Some(Commands::Search { query, count, page }) => {
            handle_search(base_dir, &query, count, page).await
        }
        Some(Commands::Info { name, project }) => handle_info(base_dir, &name, project).await,
        Some(Commands::Install {
            name,
            project,
            pip_args,
        }) => handle_install(base_dir, &name, project, &pip_args).await,
        Some(Commands::Tree { project }) => handle_tree(base_dir, project).await,
        Some(Commands::Config { action }) => handle_config(action, base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise the level follows `--verbose` / `--quiet`
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,rplugin_core={level},nb_rplugin={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "nb-rplugin", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(base) = cli_base {
        return Ok(base);
    }

    if let Ok(base) = std::env::var("RPLUGIN_BASE") {
        return Ok(PathBuf::from(base));
    }

    default_base_dir()
}

fn resolve_project_dir(project: Option<PathBuf>) -> Result<PathBuf> {
    match project {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

/// Clients built from the config file
struct Clients {
    config: Config,
    registry: RegistryClient,
    index: PackageIndexClient,
}

impl Clients {
    fn load(base_dir: &Path) -> Result<Self> {
        let config = Config::load(base_dir)?;
        let registry =
            RegistryClient::from_config(build_client(config.registry.timeout())?, &config.registry);
        let index =
            PackageIndexClient::from_config(build_client(config.index.timeout())?, &config.index);
        debug!(mirrors = registry.mirrors().len(), "clients ready");

        Ok(Self {
            config,
            registry,
            index,
        })
    }

    fn python(&self, project: &Project) -> PathBuf {
        project.python(self.config.python_override())
    }
}

async fn handle_list(base_dir: &Path, count: usize, page: usize) -> Result<()> {
    let clients = Clients::load(base_dir)?;
    let plugins = clients.registry.get_plugins().await?;

    render::print_page(STORE_TITLE, &paginate(&plugins, count, page));
    Ok(())
}

async fn handle_search(base_dir: &Path, query: &str, count: usize, page: usize) -> Result<()> {
    let clients = Clients::load(base_dir)?;
    let plugins = clients.registry.get_plugins().await?;

    let matches: Vec<Plugin> = search_plugins(&plugins, query)
        .into_iter()
        .cloned()
        .collect();
    if matches.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    let title = format!("{} · \"{}\"", STORE_TITLE, query);
    render::print_page(&title, &paginate(&matches, count, page));
    Ok(())
}

async fn handle_info(base_dir: &Path, name: &str, project: Option<PathBuf>) -> Result<()> {
    let clients = Clients::load(base_dir)?;
    let plugins = clients.registry.get_plugins().await?;
    let plugin = get_plugin_by_name(&plugins, name)?;

    // Only the installed version depends on the project; a broken one is not fatal
    let python = resolve_python(
        &resolve_project_dir(project)?,
        clients.config.python_override(),
    );
    let resolver = EnvironmentResolver::new(python);

    let stats = async {
        let repo = repo_from_homepage(&plugin.homepage)?;
        match clients.index.get_repo_statistics(repo).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(repo, error = %e, "repository statistics unavailable");
                None
            }
        }
    };
    let metadata = async {
        match clients
            .index
            .get_package_metadata_retry(&plugin.project_link, clients.config.index.retry_attempts)
            .await
        {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(package = %plugin.project_link, error = %e, "package metadata unavailable");
                None
            }
        }
    };

    let (metadata, installed, stats) = tokio::join!(
        metadata,
        resolver.installed_version(&plugin.module_name),
        stats
    );

    render::print_info(
        plugin,
        metadata.as_deref(),
        installed.as_deref(),
        stats.as_ref(),
    );
    Ok(())
}

async fn handle_install(
    base_dir: &Path,
    name: &str,
    project: Option<PathBuf>,
    pip_args: &[String],
) -> Result<()> {
    let clients = Clients::load(base_dir)?;
    let plugins = clients.registry.get_plugins().await?;
    let plugin = get_plugin_by_name(&plugins, name)?;

    let project = Project::load(&resolve_project_dir(project)?)?;
    let installer = PipInstaller::new(clients.python(&project));

    println!(
        "{} {} ({})",
        "Installing:".cyan(),
        plugin.name.bold(),
        plugin.project_link
    );
    let extra_args = (!pip_args.is_empty()).then_some(pip_args);
    installer
        .install_checked(std::slice::from_ref(&plugin.project_link), extra_args)
        .await?;

    println!("{} {}", "Installed:".green(), plugin.project_link);
    if !project.plugins.contains(&plugin.module_name) {
        println!(
            "{}",
            format!(
                "Add \"{}\" to [tool.nonebot].plugins in pyproject.toml to load it",
                plugin.module_name
            )
            .dimmed()
        );
    }
    Ok(())
}

async fn handle_tree(base_dir: &Path, project: Option<PathBuf>) -> Result<()> {
    let clients = Clients::load(base_dir)?;
    let project = Project::load(&resolve_project_dir(project)?)?;
    let catalog = clients.registry.get_plugins().await?;

    let (roots, missing) = resolve_project_plugins(&catalog, &project.plugins);
    for module in &missing {
        debug!(module = %module, "plugin not in store, skipped");
    }

    let resolver = EnvironmentResolver::new(clients.python(&project));
    let tree = TreeBuilder::new(&clients.registry, &clients.index, &resolver)
        .with_retry_attempts(clients.config.index.retry_attempts)
        .with_max_depth(clients.config.tree.max_depth)
        .build_tree(&project.name, &roots)
        .await?;

    render::print_tree(&tree);

    if !missing.is_empty() {
        println!();
        println!(
            "{} {}",
            "Not in store:".dimmed(),
            missing.join(", ").dimmed()
        );
    }
    Ok(())
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(RpluginError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}
