// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Twin Boss control plane core
//!
//! Holds the authoritative routing state (domains, agents, storage profile),
//! applies mutations under exclusive access with atomic persistence, and
//! re-derives the edge router's dynamic configuration after every change.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, persistence adapters and application services

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
