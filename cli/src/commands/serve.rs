// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use twinboss_core::domain::node_config::ControlPlaneConfig;

use super::ControlPlaneContext;
use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (overrides spec.api.bind_address)
    #[arg(long, env = "TWINBOSS_HOST")]
    pub host: Option<String>,

    /// Listen port (overrides spec.api.port)
    #[arg(long, env = "TWINBOSS_PORT")]
    pub port: Option<u16>,
}

pub async fn handle_command(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = ControlPlaneConfig::load_or_default(config_path)?;
    if let Some(host) = args.host {
        config.spec.api.bind_address = host;
    }
    if let Some(port) = args.port {
        config.spec.api.port = port;
    }
    config.validate()?;

    server::serve(ControlPlaneContext::from_config(config)?).await
}
