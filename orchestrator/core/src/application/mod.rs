// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod control_plane;
pub mod twin;
pub mod playbooks;

// Re-export use cases for convenience
pub use control_plane::{Bootstrap, ConfigSummary, ControlPlaneError, ControlPlaneService, KeysPresent, Mutated};
pub use twin::{score_output, TwinOutcome, TwinService};
pub use playbooks::{BusinessIntegration, PlaybookReport, PlaybookService};
