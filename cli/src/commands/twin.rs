// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use twinboss_core::application::TwinService;
use twinboss_core::domain::node_config::ControlPlaneConfig;
use twinboss_core::infrastructure::{EventBus, FallbackGenerator};

/// Generate two answers for `query` and print the better one
pub async fn run(query: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = ControlPlaneConfig::load_or_default(config_path).context("Failed to load configuration")?;
    let generator = FallbackGenerator::from_config(&config.spec.generation);
    if !generator.is_live() {
        println!("{}", "No OpenAI key configured; answers are placeholders".yellow());
    }

    let twin = TwinService::new(Arc::new(generator), Arc::new(EventBus::with_default_capacity()));
    let outcome = twin.twin_execute(&query).await?;

    println!(
        "{}",
        format!(
            "Chose {} (A={:.2}, B={:.2})",
            outcome.chosen, outcome.score_a, outcome.score_b
        )
        .bold()
    );
    println!();
    println!("{}", outcome.output);
    Ok(())
}
