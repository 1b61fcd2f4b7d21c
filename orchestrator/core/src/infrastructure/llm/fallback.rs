// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Fallback Content Generator
//
// Wraps an optional real generator. With no generator configured, or when the
// real one fails, a deterministic placeholder derived from the prompt is
// returned instead of an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::generation::{ContentGenerator, GenerationError};
use crate::domain::node_config::GenerationConfig;

use super::openai::OpenAIGenerator;

const MOCK_PREFIX: &str = "[MOCK OPENAI OUTPUT]";
const MOCK_PROMPT_CHARS: usize = 140;

#[derive(Clone, Default)]
pub struct FallbackGenerator {
    inner: Option<Arc<dyn ContentGenerator>>,
}

impl FallbackGenerator {
    pub fn new(inner: Option<Arc<dyn ContentGenerator>>) -> Self {
        Self { inner }
    }

    /// Placeholder-only generator
    pub fn mock() -> Self {
        Self { inner: None }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        match OpenAIGenerator::from_config(config) {
            Ok(Some(generator)) => Self::new(Some(Arc::new(generator))),
            Ok(None) => {
                debug!("No OpenAI key configured, generation runs in mock mode");
                Self::mock()
            }
            Err(e) => {
                warn!("OpenAI generator unavailable, using mock output: {}", e);
                Self::mock()
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.inner.is_some()
    }

    pub fn mock_output(prompt: &str) -> String {
        let head: String = prompt.chars().take(MOCK_PROMPT_CHARS).collect();
        format!("{MOCK_PREFIX} {head} ...")
    }
}

#[async_trait]
impl ContentGenerator for FallbackGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let Some(inner) = &self.inner else {
            return Ok(Self::mock_output(prompt));
        };

        match inner.generate(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(provider = inner.provider(), "Generation failed, using mock output: {}", e);
                metrics::counter!("twinboss_generation_fallbacks_total").increment(1);
                Ok(Self::mock_output(prompt))
            }
        }
    }

    fn provider(&self) -> &str {
        self.inner.as_ref().map_or("mock", |inner| inner.provider())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl ContentGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::RateLimit)
        }

        fn provider(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_mock_without_generator() {
        let generator = FallbackGenerator::mock();
        let text = generator.generate("deploy the api").await.unwrap();
        assert_eq!(text, "[MOCK OPENAI OUTPUT] deploy the api ...");
        assert_eq!(generator.provider(), "mock");
    }

    #[tokio::test]
    async fn test_mock_truncates_prompt() {
        let prompt = "x".repeat(500);
        let text = FallbackGenerator::mock().generate(&prompt).await.unwrap();
        assert_eq!(text, format!("[MOCK OPENAI OUTPUT] {} ...", "x".repeat(140)));
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let generator = FallbackGenerator::new(Some(Arc::new(FailingGenerator)));
        assert!(generator.is_live());
        let text = generator.generate("rotate keys").await.unwrap();
        assert!(text.starts_with("[MOCK OPENAI OUTPUT] rotate keys"));
    }
}
