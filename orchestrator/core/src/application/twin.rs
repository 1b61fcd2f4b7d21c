// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Twin Execution
//!
//! Asks the content generator for two independent answers to the same query,
//! scores both with a deployability heuristic and keeps the better one.
//! Never touches the routing state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::control_plane::ControlPlaneError;
use crate::domain::events::ControlPlaneEvent;
use crate::domain::generation::ContentGenerator;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::FallbackGenerator;

const DEPLOY_KEYWORDS: [&str; 10] = [
    "docker",
    "deploy",
    "install",
    "powershell",
    "bash",
    "curl",
    "npm",
    "uvicorn",
    "systemctl",
    "compose",
];

/// Heuristic deployability score of a generated answer
pub fn score_output(text: &str) -> f64 {
    let lower = text.to_lowercase();

    let mut score = text.matches("```").count() as f64 * 2.0;
    score += DEPLOY_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count() as f64;
    if lower.contains("example") || lower.contains("sample") {
        score -= 3.0;
    }
    score + text.split_whitespace().count() as f64 / 500.0
}

#[derive(Debug, Clone, Serialize)]
pub struct TwinOutcome {
    /// "A" or "B"
    pub chosen: String,
    #[serde(rename = "scoreA")]
    pub score_a: f64,
    #[serde(rename = "scoreB")]
    pub score_b: f64,
    pub output: String,
}

pub struct TwinService {
    generator: Arc<dyn ContentGenerator>,
    event_bus: Arc<EventBus>,
}

impl TwinService {
    pub fn new(generator: Arc<dyn ContentGenerator>, event_bus: Arc<EventBus>) -> Self {
        Self { generator, event_bus }
    }

    pub async fn twin_execute(&self, query: &str) -> Result<TwinOutcome, ControlPlaneError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ControlPlaneError::Validation("query is required".to_string()));
        }

        self.event_bus.publish(ControlPlaneEvent::TwinStarted {
            query: query.to_string(),
        });

        let prompt_a = format!("Produce a complete, production-ready solution for: {query}");
        let prompt_b = format!(
            "Independently produce a different complete production solution for: {query}. \
             Use distinct stack or architecture."
        );
        let (answer_a, answer_b) = futures::join!(self.candidate(&prompt_a), self.candidate(&prompt_b));
        self.event_bus.publish(ControlPlaneEvent::TwinGenerated);

        let score_a = score_output(&answer_a);
        let score_b = score_output(&answer_b);
        self.event_bus.publish(ControlPlaneEvent::TwinSelected { score_a, score_b });

        let (chosen, output) = if score_a >= score_b {
            ("A", answer_a)
        } else {
            ("B", answer_b)
        };
        info!(provider = self.generator.provider(), chosen, score_a, score_b, "Twin execution finished");

        Ok(TwinOutcome {
            chosen: chosen.to_string(),
            score_a,
            score_b,
            output,
        })
    }

    async fn candidate(&self, prompt: &str) -> String {
        match self.generator.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Candidate generation failed, using mock output: {}", e);
                metrics::counter!("twinboss_generation_fallbacks_total").increment(1);
                FallbackGenerator::mock_output(prompt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::GenerationError;
    use async_trait::async_trait;

    struct ScriptedGenerator;

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            if prompt.starts_with("Independently") {
                Ok("```bash\ndocker compose up -d\n```".to_string())
            } else {
                Ok("Here is a sample.".to_string())
            }
        }

        fn provider(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_score_output() {
        assert_eq!(score_output(""), 0.0);
        // two fences, docker + compose + bash, 5 words
        let text = "```bash\ndocker compose up\n```";
        assert!((score_output(text) - (4.0 + 3.0 + 5.0 / 500.0)).abs() < 1e-9);
        assert!(score_output("an EXAMPLE answer") < 0.0);
    }

    #[tokio::test]
    async fn test_picks_higher_score() {
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();
        let twin = TwinService::new(Arc::new(ScriptedGenerator), bus.clone());

        let outcome = twin.twin_execute("  ship the api ").await.unwrap();
        assert_eq!(outcome.chosen, "B");
        assert!(outcome.output.contains("docker compose"));
        assert!(outcome.score_b > outcome.score_a);

        assert_eq!(events.recv().await.unwrap().to_string(), "twin:start:ship the api");
        assert_eq!(events.recv().await.unwrap().to_string(), "twin:generated:two-candidates");
        assert!(events.recv().await.unwrap().to_string().starts_with("twin:selected:best s1="));
    }

    struct ConstantGenerator;

    #[async_trait]
    impl ContentGenerator for ConstantGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("npm install".to_string())
        }

        fn provider(&self) -> &str {
            "constant"
        }
    }

    #[tokio::test]
    async fn test_tie_prefers_a() {
        let twin = TwinService::new(Arc::new(ConstantGenerator), Arc::new(EventBus::new(16)));
        let outcome = twin.twin_execute("x").await.unwrap();
        assert_eq!(outcome.chosen, "A");
        assert_eq!(outcome.score_a, outcome.score_b);
    }

    #[tokio::test]
    async fn test_mock_generator_output() {
        let twin = TwinService::new(Arc::new(FallbackGenerator::mock()), Arc::new(EventBus::new(16)));
        let outcome = twin.twin_execute("x").await.unwrap();
        assert!(outcome.output.starts_with("[MOCK OPENAI OUTPUT]"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let twin = TwinService::new(Arc::new(FallbackGenerator::mock()), Arc::new(EventBus::new(4)));
        assert!(matches!(
            twin.twin_execute("   ").await,
            Err(ControlPlaneError::Validation(_))
        ));
    }
}
