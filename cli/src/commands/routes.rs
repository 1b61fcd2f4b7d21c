// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use super::ControlPlaneContext;

#[derive(Subcommand)]
pub enum RoutesCommand {
    /// Print the dynamic routing config for the current state
    Render {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn handle_command(command: RoutesCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = ControlPlaneContext::open(config_path)?;

    match command {
        RoutesCommand::Render { output } => {
            let artifact = ctx.control_plane.render_routes()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, artifact)
                        .with_context(|| format!("Failed to write routing config to {:?}", path))?;
                    println!("{}", format!("✓ Routing config written to {}", path.display()).green());
                }
                None => print!("{}", artifact),
            }
            Ok(())
        }
    }
}
