// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Twin Boss CLI
//!
//! The `twinboss` binary manages the routing state of a Twin Boss host and
//! serves the control plane API.
//!
//! ## Commands
//!
//! - `twinboss serve` - Run the HTTP API (seeds domains, writes routing config)
//! - `twinboss domain host|list` - Domain routing
//! - `twinboss agent register|ensure|list` - Agent registry
//! - `twinboss storage setup|show` - Storage profile
//! - `twinboss routes render` - Print the dynamic routing config
//! - `twinboss config show|validate|generate` - Configuration management
//! - `twinboss twin <QUERY>` - Twin execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use twinboss_cli::commands::{
    self, AgentCommand, ConfigCommand, DomainCommand, RoutesCommand, ServeArgs, StorageCommand,
};

/// Twin Boss - routing state manager and control plane
#[derive(Parser)]
#[command(name = "twinboss")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TWINBOSS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control plane HTTP API
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Domain routing
    #[command(name = "domain")]
    Domain {
        #[command(subcommand)]
        command: DomainCommand,
    },

    /// Agent registry
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Storage profile
    #[command(name = "storage")]
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },

    /// Dynamic routing config
    #[command(name = "routes")]
    Routes {
        #[command(subcommand)]
        command: RoutesCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate two answers for a query and keep the better one
    #[command(name = "twin")]
    Twin {
        #[arg(value_name = "QUERY")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::handle_command(args, cli.config).await,
        Some(Commands::Domain { command }) => commands::domain::handle_command(command, cli.config).await,
        Some(Commands::Agent { command }) => commands::agent::handle_command(command, cli.config).await,
        Some(Commands::Storage { command }) => commands::storage::handle_command(command, cli.config).await,
        Some(Commands::Routes { command }) => commands::routes::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Twin { query }) => commands::twin::run(query, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
