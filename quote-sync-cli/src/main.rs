use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod sync;

use commands::{
    AddCommand, ConfigCommand, FilterCommand, ListCommand, OfflineCommand, RandomCommand,
    SearchCommand, StatsCommand, SyncCommand,
};
use config::Config;
use quote_sync_core::SyncEngine;
use sync::{open_engine, try_auto_sync};

#[derive(Parser)]
#[command(name = "quotes")]
#[command(version)]
#[command(about = "A local-first quote collection that syncs with a shared server", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a quote
    Add(AddCommand),

    /// List quotes
    List(ListCommand),

    /// Show a random quote
    Random(RandomCommand),

    /// Search quote text
    Search(SearchCommand),

    /// Show quote statistics
    Stats(StatsCommand),

    /// Show or set the remembered category filter
    Filter(FilterCommand),

    /// Sync with the remote collection
    Sync(SyncCommand),

    /// Switch offline mode on or off
    Offline(OfflineCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "quote_sync_cli=info,quote_sync_core=info"
    } else {
        "quote_sync_cli=warn,quote_sync_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Save config path for init command
    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config, cli_config_path),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let engine = open_engine(&config);

        // Auto-sync BEFORE read commands
        if is_read_command(&command) {
            try_auto_sync(&engine, &config).await;
        }

        let result = execute_command(&command, &engine, &config).await;

        // Auto-sync AFTER write commands (only if command succeeded)
        if result.is_ok() && is_write_command(&command) {
            try_auto_sync(&engine, &config).await;
        }

        engine.shutdown();
        result
    })
}

async fn execute_command(
    command: &Commands,
    engine: &SyncEngine,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Add(cmd) => cmd.run(engine).await?,
        Commands::List(cmd) => cmd.run(engine)?,
        Commands::Random(cmd) => cmd.run(engine)?,
        Commands::Search(cmd) => cmd.run(engine)?,
        Commands::Stats(cmd) => cmd.run(engine).await?,
        Commands::Filter(cmd) => cmd.run(engine)?,
        Commands::Sync(cmd) => cmd.run(engine, config).await?,
        Commands::Offline(cmd) => cmd.run(engine).await,
        // Handled before the engine is opened
        Commands::Config(_) => {}
    }

    Ok(())
}

/// Returns true if the command is a read operation that should sync before execution.
fn is_read_command(cmd: &Commands) -> bool {
    matches!(
        cmd,
        Commands::List(_)
            | Commands::Random(_)
            | Commands::Search(_)
            | Commands::Stats(_)
    )
}

/// Returns true if the command is a write operation that should sync after execution.
fn is_write_command(cmd: &Commands) -> bool {
    matches!(cmd, Commands::Add(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from(["quotes", "add", "Be kind", "--category", "Life"]).unwrap();
        match cli.command {
            Some(Commands::Add(cmd)) => {
                assert_eq!(cmd.text, "Be kind");
                assert_eq!(cmd.category, "Life");
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_add_requires_category() {
        assert!(Cli::try_parse_from(["quotes", "add", "Be kind"]).is_err());
    }

    #[test]
    fn test_command_classification() {
        let read = Cli::try_parse_from(["quotes", "list"]).unwrap().command.unwrap();
        let write = Cli::try_parse_from(["quotes", "add", "x", "--category", "y"])
            .unwrap()
            .command
            .unwrap();
        let neither = Cli::try_parse_from(["quotes", "sync", "status"])
            .unwrap()
            .command
            .unwrap();

        assert!(is_read_command(&read) && !is_write_command(&read));
        assert!(is_write_command(&write) && !is_read_command(&write));
        assert!(!is_read_command(&neither) && !is_write_command(&neither));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
