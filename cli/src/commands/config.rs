// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use twinboss_core::domain::node_config::ControlPlaneConfig;

use super::{print_json, ControlPlaneContext};

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration and state summary
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./twinboss-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. TWINBOSS_CONFIG_PATH: {}",
            std::env::var("TWINBOSS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./twinboss-config.yaml");
        println!("  4. ~/.twinboss/config.yaml");
        println!("  5. /etc/twinboss/config.yaml");
        println!();
    }

    let ctx = ControlPlaneContext::open(config_override)?;
    let spec = &ctx.config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", ctx.config.metadata.name);
    println!("  State file: {}", spec.paths.state_file().display());
    println!("  Routing file: {}", spec.paths.routing_file.display());
    println!("  API: {}:{}", spec.api.bind_address, spec.api.port);
    println!(
        "  API key: {}",
        if spec.api.api_key.is_some() { "set".green() } else { "(open)".yellow() }
    );
    println!("  Model: {} @ {}", spec.generation.model, spec.generation.endpoint);
    println!();

    println!("{}", "Service ports:".bold());
    for (service, port) in ctx.control_plane.service_ports().iter() {
        println!("  {:<16} {}", service, port);
    }
    println!();

    println!("{}", "State summary:".bold());
    print_json(&ctx.control_plane.config_summary()?)
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ControlPlaneConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    std::fs::write(&output, MINIMAL_TEMPLATE)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration written to {}", output.display()).green());
    Ok(())
}
