// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Twin Boss CLI
//!
//! Every command runs the control plane in-process against the configured
//! state file; nothing here talks to a running server.

pub mod agent;
pub mod config;
pub mod domain;
pub mod routes;
pub mod serve;
pub mod storage;
pub mod twin;

pub use self::agent::AgentCommand;
pub use self::config::ConfigCommand;
pub use self::domain::DomainCommand;
pub use self::routes::RoutesCommand;
pub use self::serve::ServeArgs;
pub use self::storage::StorageCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use twinboss_core::application::ControlPlaneService;
use twinboss_core::domain::node_config::ControlPlaneConfig;
use twinboss_core::infrastructure::EventBus;

/// Loaded configuration plus the wired control plane
pub struct ControlPlaneContext {
    pub config: ControlPlaneConfig,
    pub event_bus: Arc<EventBus>,
    pub control_plane: Arc<ControlPlaneService>,
}

impl ControlPlaneContext {
    pub fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config = ControlPlaneConfig::load_or_default(config_path).context("Failed to load configuration")?;
        config.validate().context("Configuration validation failed")?;
        Self::from_config(config)
    }

    pub fn from_config(config: ControlPlaneConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let control_plane = ControlPlaneService::from_config(&config, event_bus.clone()).with_context(|| {
            format!(
                "Failed to open state file {}",
                config.spec.paths.state_file().display()
            )
        })?;

        Ok(Self {
            config,
            event_bus,
            control_plane: Arc::new(control_plane),
        })
    }
}

/// Print `value` as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}
