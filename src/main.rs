//! Netgrow CLI - Function-Preserving Network Growth
//!
//! Command-line interface over the file weight store.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use netgrow::cli::{commands, Cli, Commands};
use netgrow::GrowthConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Netgrow v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => GrowthConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GrowthConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("Netgrow v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &GrowthConfig, cmd: Commands) -> anyhow::Result<()> {
    let result = match cmd {
        Commands::Init { id, units } => commands::init(config, id, units).map(|_| ()),
        Commands::Widen { id, layer, units } => {
            commands::widen(config, id, layer, units).map(|_| ())
        }
        Commands::Deepen { id, layer } => commands::deepen(config, id, layer).map(|_| ()),
        Commands::Show { id } => commands::show(config, id),
        Commands::Snapshot { id, out } => commands::snapshot(config, id, out).map(|_| ()),
        Commands::Restore { id, from } => commands::restore(config, id, &from).map(|_| ()),
        Commands::Clear { id } => commands::clear(config, id),
        Commands::Prune { id } => commands::prune(config, id).map(|_| ()),
    };

    if let Err(err) = &result {
        if let Some(suggestion) = err.recovery_suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
    }
    result.context("command failed")
}
