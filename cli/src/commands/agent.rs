// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use twinboss_core::domain::upsert::AgentRegistration;

use super::{print_json, ControlPlaneContext};

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Register (or re-register) an agent
    Register {
        /// Display name; the slug is derived from it
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long, default_value = "generalist")]
        role: String,

        #[arg(long, default_value = "member")]
        rights: String,

        #[arg(long, default_value = "active")]
        status: String,

        #[arg(long)]
        endpoint: Option<String>,

        /// Capability tag (repeatable)
        #[arg(long = "capability", short = 'c')]
        capabilities: Vec<String>,

        /// Hostname the agent serves (repeatable)
        #[arg(long = "domain", short = 'd')]
        domains: Vec<String>,
    },

    /// Make sure an admin agent exists
    Ensure {
        /// Display name (default: timestamped)
        #[arg(value_name = "NAME", default_value = "")]
        name: String,
    },

    /// List registered agents
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: AgentCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = ControlPlaneContext::open(config_path)?;

    match command {
        AgentCommand::Register {
            name,
            role,
            rights,
            status,
            endpoint,
            capabilities,
            domains,
        } => {
            let registration = AgentRegistration {
                name,
                role,
                rights,
                status,
                endpoint,
                capabilities,
                domains,
            };
            let registered = ctx
                .control_plane
                .register_agent(&registration)
                .context("Failed to register agent")?;
            println!(
                "{}",
                format!(
                    "✓ Agent registered: {} ({}) revision {}",
                    registered.record.name, registered.record.slug, registered.revision
                )
                .green()
            );
            Ok(())
        }
        AgentCommand::Ensure { name } => {
            let ensured = ctx.control_plane.ensure_agent(&name).context("Failed to ensure agent")?;
            println!(
                "{}",
                format!(
                    "✓ Admin agent ready: {} ({}) revision {}",
                    ensured.record.name, ensured.record.slug, ensured.revision
                )
                .green()
            );
            Ok(())
        }
        AgentCommand::List { json } => list(&ctx, json),
    }
}

fn list(ctx: &ControlPlaneContext, json: bool) -> Result<()> {
    let (agents, revision) = ctx.control_plane.list_agents()?;

    if json {
        return print_json(&serde_json::json!({ "agents": agents, "revision": revision }));
    }

    if agents.is_empty() {
        println!("{}", "No agents found".yellow());
        return Ok(());
    }

    println!("{} agents found:", agents.len());
    println!("{:<24} {:<24} {:<12} {:<10} {}", "NAME", "SLUG", "ROLE", "RIGHTS", "STATUS");
    for agent in &agents {
        let status = match agent.status.as_str() {
            "active" | "ready" => agent.status.green(),
            _ => agent.status.yellow(),
        };
        println!(
            "{:<24} {:<24} {:<12} {:<10} {}",
            agent.name, agent.slug, agent.role, agent.rights, status
        );
    }
    Ok(())
}
