// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod state_store;
pub mod routing_writer;
pub mod event_bus;
pub mod llm;

pub use state_store::StateStore;
pub use routing_writer::RoutingConfigWriter;
pub use event_bus::EventBus;
pub use llm::{FallbackGenerator, OpenAIGenerator};
