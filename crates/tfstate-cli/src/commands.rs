use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tfstate_backend::Backend;
use tfstate_server::{ServerConfig, StorageConfig, TfStateServer};
use tfstate_types::Ref;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::States(args) => cmd_states(&config.build_backend(), args, cli.format).await,
        Command::Versions(args) => cmd_versions(&config.build_backend(), args, cli.format).await,
        Command::Prune(args) => cmd_prune(&config.build_backend(), args, cli.format).await,
        Command::Stats(args) => cmd_stats(&config.build_backend(), args, cli.format).await,
    }
}

/// Config file (or defaults), then the environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.memory {
        config.storage = StorageConfig::Memory;
    } else if let Some(root) = args.data_dir {
        config.storage = StorageConfig::Filesystem { root };
    }
    let server = TfStateServer::new(config)?;
    println!("tfstate server on {}", server.config().bind_addr.to_string().bold());
    server.serve().await?;
    Ok(())
}

async fn cmd_states(backend: &Backend, args: StatesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let states = match args.scope {
        Some(scope) => backend.list_states_under(&Ref::new(scope)?).await?,
        None => backend
            .list_states()
            .await?
            .into_iter()
            .map(|r| r.to_string())
            .collect(),
    };
    if let OutputFormat::Json = format {
        return print_json(&states);
    }
    if states.is_empty() {
        println!("No states.");
    }
    for state in &states {
        println!("{state}");
    }
    Ok(())
}

async fn cmd_versions(backend: &Backend, args: VersionsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reference = Ref::new(&args.reference)?;
    let versions = backend.list_versions(&reference).await?;
    if let OutputFormat::Json = format {
        return print_json(&versions);
    }
    if versions.is_empty() {
        println!("No versions for {}.", reference.to_string().yellow());
    }
    for version in &versions {
        println!(
            "{}  {}",
            version.to_string().yellow(),
            version.timestamp().format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
        );
    }
    Ok(())
}

async fn cmd_prune(backend: &Backend, args: PruneArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reference = Ref::new(&args.reference)?;
    let outcome = backend.keep_versions(&reference, args.keep).await?;
    if let OutputFormat::Json = format {
        return print_json(&outcome);
    }
    for version in &outcome.removed {
        println!("  {} {}", "removed:".red(), version);
    }
    println!(
        "{} Kept {} of {} versions of {}",
        "✓".green().bold(),
        outcome.kept.len(),
        outcome.kept.len() + outcome.removed.len(),
        reference.to_string().yellow()
    );
    Ok(())
}

async fn cmd_stats(backend: &Backend, args: StatsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let stale_after = args.stale_days.map(|days| chrono::Duration::days(i64::from(days)));
    let stats = backend.stats(stale_after).await?;
    if let OutputFormat::Json = format {
        return print_json(&stats);
    }
    println!("States:     {}", stats.states.to_string().bold());
    println!("Identities: {}", stats.identities.to_string().bold());
    println!("Locks:      {}", stats.locks.to_string().bold());
    if let Some(days) = args.stale_days {
        let stale = stats.stale_locks.to_string();
        let stale = if stats.stale_locks > 0 { stale.red() } else { stale.green() };
        println!("  older than {days}d: {stale}");
    }
    Ok(())
}
