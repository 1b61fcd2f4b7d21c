// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Records, invariants and pure projections of the routing state

pub mod hostname;
pub mod state;
pub mod upsert;
pub mod routing;
pub mod events;
pub mod generation;
pub mod node_config;
