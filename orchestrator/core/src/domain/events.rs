// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress notifications published by the control plane.
///
/// The `Display` form is the wire text pushed to preview subscribers
/// (`domains:provisioned:shop.example.com`, `storage:date:ready`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPlaneEvent {
    DomainProvisioned {
        domain: String,
        revision: u64,
        at: DateTime<Utc>,
    },
    DomainUpdated {
        domain: String,
        revision: u64,
        at: DateTime<Utc>,
    },
    DomainsSeeded {
        domains: Vec<String>,
        revision: u64,
        at: DateTime<Utc>,
    },
    StorageReady {
        revision: u64,
        at: DateTime<Utc>,
    },
    AgentRegistered {
        slug: String,
        revision: u64,
        at: DateTime<Utc>,
    },
    AgentEnsured {
        slug: String,
        revision: u64,
        at: DateTime<Utc>,
    },
    TwinStarted {
        query: String,
    },
    TwinGenerated,
    TwinSelected {
        score_a: f64,
        score_b: f64,
    },
    Playbook {
        step: String,
    },
}

impl fmt::Display for ControlPlaneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlPlaneEvent::DomainProvisioned { domain, .. } => write!(f, "domains:provisioned:{domain}"),
            ControlPlaneEvent::DomainUpdated { domain, .. } => write!(f, "domains:updated:{domain}"),
            ControlPlaneEvent::DomainsSeeded { domains, .. } => write!(f, "domains:seeded:{}", domains.len()),
            ControlPlaneEvent::StorageReady { .. } => write!(f, "storage:date:ready"),
            ControlPlaneEvent::AgentRegistered { slug, .. } => write!(f, "agent:register:{slug}"),
            ControlPlaneEvent::AgentEnsured { slug, .. } => write!(f, "agent:create:{slug}"),
            ControlPlaneEvent::TwinStarted { query } => write!(f, "twin:start:{query}"),
            ControlPlaneEvent::TwinGenerated => write!(f, "twin:generated:two-candidates"),
            ControlPlaneEvent::TwinSelected { score_a, score_b } => {
                write!(f, "twin:selected:best s1={score_a:.2} s2={score_b:.2}")
            }
            ControlPlaneEvent::Playbook { step } => f.write_str(step),
        }
    }
}
