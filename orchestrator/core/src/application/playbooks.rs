// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Operational playbooks: fixed step lists announced on the event bus.
// None of them mutate state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::application::control_plane::{ControlPlaneError, ControlPlaneService};
use crate::domain::events::ControlPlaneEvent;

pub const BUSINESS_INTEGRATIONS: [&str; 2] = ["dashboard-proxy", "api-online"];
pub const ADMIN_TASKS: [&str; 3] = ["rotate-keys:planned", "backup-config:ready", "health-checks:scheduled"];
pub const FUNDRAISING_STEPS: [&str; 4] = [
    "create-landing-check",
    "email-capture-form-ready",
    "schedule-social-posts",
    "press-release-draft",
];

#[derive(Debug, Clone, Serialize)]
pub struct BusinessIntegration {
    pub integrations: Vec<String>,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookReport {
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

pub struct PlaybookService {
    control_plane: Arc<ControlPlaneService>,
    step_pacing: Duration,
}

impl PlaybookService {
    pub fn new(control_plane: Arc<ControlPlaneService>) -> Self {
        Self {
            control_plane,
            step_pacing: Duration::from_millis(50),
        }
    }

    /// Delay between fundraising steps so stream subscribers see them apart
    pub fn with_step_pacing(mut self, pacing: Duration) -> Self {
        self.step_pacing = pacing;
        self
    }

    fn announce(&self, step: String) {
        self.control_plane
            .event_bus()
            .publish(ControlPlaneEvent::Playbook { step });
    }

    pub fn business_integrate(&self) -> Result<BusinessIntegration, ControlPlaneError> {
        self.announce("business:integrate:start".to_string());
        let domains = self.control_plane.known_hosts()?;
        self.announce(format!("business:domains:{}", domains.join(",")));

        info!(domains = domains.len(), "Business integration reported");
        Ok(BusinessIntegration {
            integrations: BUSINESS_INTEGRATIONS.iter().map(|s| s.to_string()).collect(),
            domains,
        })
    }

    pub fn admin_automate(&self) -> PlaybookReport {
        self.announce("admin:automate:start".to_string());
        for task in ADMIN_TASKS {
            self.announce(format!("admin:{task}"));
        }

        PlaybookReport {
            status: "ok".to_string(),
            tasks: ADMIN_TASKS.iter().map(|s| s.to_string()).collect(),
            steps: Vec::new(),
        }
    }

    pub async fn fundraising_deploy(&self) -> PlaybookReport {
        self.announce("fundraising:deploy:start".to_string());
        for step in FUNDRAISING_STEPS {
            self.announce(format!("fundraising:{step}"));
            if !self.step_pacing.is_zero() {
                tokio::time::sleep(self.step_pacing).await;
            }
        }

        PlaybookReport {
            status: "deployed".to_string(),
            tasks: Vec::new(),
            steps: FUNDRAISING_STEPS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
