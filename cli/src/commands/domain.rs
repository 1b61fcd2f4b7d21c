// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use twinboss_core::domain::upsert::HostDomainRequest;

use super::{print_json, ControlPlaneContext};

#[derive(Subcommand)]
pub enum DomainCommand {
    /// Route a hostname to a backend service or URL
    Host {
        /// Hostname, with or without scheme (e.g. shop.example.com)
        #[arg(value_name = "DOMAIN")]
        domain: String,

        /// Backend service name (port resolved from the service table)
        #[arg(long, short = 's')]
        service: Option<String>,

        /// Explicit backend URL (used instead of service:port)
        #[arg(long, short = 'u')]
        url: Option<String>,

        /// Backend port (overrides the service table)
        #[arg(long)]
        port: Option<u16>,

        /// Backend scheme
        #[arg(long, default_value = "http")]
        scheme: String,

        /// Entry channel (default: websecure with auto-ssl, web otherwise)
        #[arg(long)]
        entrypoint: Option<String>,

        /// Disable automatic certificates
        #[arg(long)]
        no_ssl: bool,

        /// Do not redirect plain HTTP to HTTPS
        #[arg(long)]
        no_redirect: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List routed domains
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: DomainCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = ControlPlaneContext::open(config_path)?;

    match command {
        DomainCommand::Host {
            domain,
            service,
            url,
            port,
            scheme,
            entrypoint,
            no_ssl,
            no_redirect,
            notes,
        } => {
            let request = HostDomainRequest {
                domain,
                target_service: service,
                target_port: port,
                target_scheme: scheme,
                target_url: url,
                entrypoint,
                auto_ssl: !no_ssl,
                redirect_to_https: !no_redirect,
                notes,
            };
            host(&ctx, &request)
        }
        DomainCommand::List { json } => list(&ctx, json),
    }
}

fn host(ctx: &ControlPlaneContext, request: &HostDomainRequest) -> Result<()> {
    let hosted = ctx
        .control_plane
        .host_domain(request)
        .with_context(|| format!("Failed to host domain '{}'", request.domain))?;

    let record = &hosted.record;
    println!(
        "{}",
        format!("✓ {} routed (revision {})", record.domain, hosted.revision).green()
    );
    println!("  Entrypoint: {}", record.entrypoint);
    if let Some(url) = &record.target_url {
        println!("  Target: {}", url);
    } else if let Some(service) = &record.target_service {
        let port = record.target_port.map(|p| p.to_string()).unwrap_or_default();
        println!("  Target: {}://{}:{}", record.target_scheme, service, port);
    }
    println!(
        "  Routing config: {}",
        ctx.config.spec.paths.routing_file.display().to_string().dimmed()
    );
    Ok(())
}

fn list(ctx: &ControlPlaneContext, json: bool) -> Result<()> {
    let (domains, revision) = ctx.control_plane.list_domains()?;

    if json {
        return print_json(&serde_json::json!({ "domains": domains, "revision": revision }));
    }

    if domains.is_empty() {
        println!("{}", "No domains routed".yellow());
        return Ok(());
    }

    println!("{} domains (revision {}):", domains.len(), revision);
    println!("{:<36} {:<12} {:<24} {}", "DOMAIN", "ENTRYPOINT", "TARGET", "UPDATED");
    for record in &domains {
        let target = record
            .target_url
            .clone()
            .or_else(|| record.target_service.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<12} {:<24} {}",
            record.domain,
            record.entrypoint,
            target,
            record.updated_at.to_rfc3339()
        );
    }
    Ok(())
}
