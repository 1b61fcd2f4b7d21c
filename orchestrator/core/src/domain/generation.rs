// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Content Generation
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption interface for external text generation

// Implementations in infrastructure/llm/. The control plane only ever needs
// `generate(prompt) -> text`; response quality is not its concern.

use async_trait::async_trait;

/// Domain interface for text generation services
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produce a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short provider label used in logs (e.g. "openai", "mock")
    fn provider(&self) -> &str;
}

/// Errors that can occur while calling a generation service
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Provider error: {0}")]
    Provider(String),
}
