// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use twinboss_core::domain::state::StorageStatus;
use twinboss_core::domain::upsert::StorageSetupRequest;

use super::{print_json, ControlPlaneContext};

#[derive(Subcommand)]
pub enum StorageCommand {
    /// Configure the dating-app storage profile
    Setup {
        #[arg(long, default_value = "postgres")]
        engine: String,

        #[arg(long, default_value = "us-east-1")]
        region: String,

        #[arg(long, default_value_t = 1)]
        replicas: u32,

        #[arg(long, default_value_t = 365)]
        retention_days: u32,

        /// Backup region (repeatable)
        #[arg(long = "backup-region")]
        backup_regions: Vec<String>,

        #[arg(long)]
        analytics: bool,

        /// Disable encryption at rest
        #[arg(long)]
        no_encryption: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the storage profile
    Show,
}

pub async fn handle_command(command: StorageCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = ControlPlaneContext::open(config_path)?;

    match command {
        StorageCommand::Setup {
            engine,
            region,
            replicas,
            retention_days,
            backup_regions,
            analytics,
            no_encryption,
            notes,
        } => {
            let request = StorageSetupRequest {
                storage_engine: engine,
                primary_region: region,
                replicas,
                retention_days,
                backup_regions,
                analytics,
                encryption: !no_encryption,
                notes,
            };
            let ready = ctx
                .control_plane
                .setup_storage(&request)
                .context("Failed to set up storage")?;
            println!("{}", format!("✓ Storage ready (revision {})", ready.revision).green());
            Ok(())
        }
        StorageCommand::Show => {
            let profile = ctx.control_plane.storage_profile()?;
            if profile.status == StorageStatus::Uninitialized {
                println!("{}", "Storage has not been set up".yellow());
            }
            print_json(&profile)
        }
    }
}
