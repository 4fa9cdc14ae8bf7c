use anyhow::Result;
use clap::{Parser, Subcommand};
use ctxkit::runtime::{run, ContextHierarchy, RunOptions, ShutdownOptions};
use ctxkit::ComponentLookup;
use ctxkit_bootstrap::{AppConfig, AppConfigProvider, CliArgs};
use mimalloc::MiMalloc;

use std::path::{Path, PathBuf};

mod assembly;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// ctxkit host - runs a hierarchy of component contexts
#[derive(Parser)]
#[command(name = "ctxkit-host")]
#[command(about = "Builds, refreshes and serves a hierarchy of component contexts")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Active profile for the root context (repeatable, replaces configured profiles)
    #[arg(short, long = "profile")]
    profiles: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the hierarchy and keep it active until shutdown
    Run,
    /// Build and refresh the hierarchy once, print a summary and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        profiles: cli.profiles.clone(),
    };

    // defaults -> YAML (if provided) -> env (APP__*) -> CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    ctxkit_bootstrap::init_logging(&logging_config, Path::new(&config.host.home_dir));

    tracing::info!(home_dir = %config.host.home_dir, "ctxkit host starting");

    let provider = AppConfigProvider::new(config);
    let hierarchy = assembly::build_hierarchy(&provider)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_host(hierarchy).await,
        Commands::Check => check_hierarchy(hierarchy),
    }
}

async fn run_host(hierarchy: ContextHierarchy) -> Result<()> {
    let result = run(RunOptions {
        hierarchy,
        shutdown: ShutdownOptions::Signals,
    })
    .await;

    match &result {
        Ok(()) => tracing::info!("ctxkit host stopped"),
        Err(e) => tracing::error!(error = %e, "ctxkit host failed"),
    }
    result
}

fn check_hierarchy(hierarchy: ContextHierarchy) -> Result<()> {
    tracing::info!("Checking configuration…");
    hierarchy.refresh_all()?;

    let levels = std::iter::once(("root", hierarchy.root())).chain(hierarchy.children());
    for (name, node) in levels {
        let components = node.component_names()?;
        let profiles = node.active_profiles()?;
        println!(
            "{name}: display_name={} depth={} components={} profiles=[{}]",
            node.display_name(),
            node.depth(),
            components.len(),
            profiles.join(",")
        );
    }

    hierarchy.close_all();
    println!("Configuration is valid");
    Ok(())
}
