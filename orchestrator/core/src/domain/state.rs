// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Routing State Aggregate
//!
//! `StateDocument` is the single root aggregate of the control plane. Domain,
//! agent and storage records are owned by it and have no lifecycle outside
//! of it; every change goes through `StateStore::mutate`, which recomputes
//! `meta` via [`StateDocument::commit`].
//!
//! Deserialization is deliberately forgiving at the field level (missing
//! fields take defaults) so that a single host-less domain entry does not
//! make the whole document unreadable. Such entries are skipped by the
//! routing projection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

/// Logical name of the singleton storage profile slot
pub const STORAGE_SLOT: &str = "date_app";

/// Current time truncated to whole seconds
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    #[default]
    Uninitialized,
    Ready,
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStatus::Uninitialized => write!(f, "uninitialized"),
            StorageStatus::Ready => write!(f, "ready"),
        }
    }
}

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    Provisioned,
    Updated,
    SeededEnv,
    Registered,
    EnsureAdmin,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HistoryAction::Provisioned => "provisioned",
            HistoryAction::Updated => "updated",
            HistoryAction::SeededEnv => "seeded-env",
            HistoryAction::Registered => "registered",
            HistoryAction::EnsureAdmin => "ensure-admin",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMeta {
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Incremented by exactly one on every committed mutation
    pub revision: u64,
    pub domain_count: usize,
    pub agent_count: usize,
    pub storage_status: StorageStatus,
}

/// Routing entry for one canonical hostname
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRecord {
    /// Canonical hostname; immutable once assigned
    pub domain: String,
    /// Fingerprint of `domain`
    pub id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub target_service: Option<String>,
    pub target_url: Option<String>,
    pub target_port: Option<u16>,
    pub target_scheme: String,
    pub entrypoint: String,
    pub auto_ssl: bool,
    pub redirect_to_https: bool,
    pub notes: Option<String>,
    /// Explicit backend name; derived from the target when absent
    pub service_name: Option<String>,
    /// Explicit router name; derived from the hostname when absent
    pub router_name: Option<String>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentRecord {
    pub name: String,
    /// Derived from `name` at first registration, never changes afterwards
    pub slug: String,
    pub role: String,
    pub rights: String,
    pub status: String,
    pub endpoint: Option<String>,
    pub capabilities: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub history: Vec<HistoryEntry>,
}

/// Settings applied by the last successful storage setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub storage_engine: String,
    pub primary_region: String,
    pub replicas: u32,
    pub retention_days: u32,
    #[serde(default)]
    pub backup_regions: BTreeSet<String>,
    #[serde(default)]
    pub analytics: bool,
    #[serde(default)]
    pub encryption: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageProfile {
    pub status: StorageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<StorageSettings>,
}

impl StorageProfile {
    fn uninitialized(at: Timestamp) -> Self {
        Self {
            status: StorageStatus::Uninitialized,
            created_at: None,
            updated_at: at,
            settings: None,
        }
    }
}

/// Storage profile slots; only the `date_app` slot exists today
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSlots {
    pub date_app: StorageProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub meta: StateMeta,
    /// Sorted by canonical hostname, at most one record per hostname
    pub domains: Vec<DomainRecord>,
    /// Keyed by slug
    pub agents: BTreeMap<String, AgentRecord>,
    pub storage: StorageSlots,
}

impl StateDocument {
    /// Fresh document at revision 0
    pub fn empty(at: Timestamp) -> Self {
        Self {
            meta: StateMeta {
                created_at: at,
                updated_at: at,
                revision: 0,
                domain_count: 0,
                agent_count: 0,
                storage_status: StorageStatus::Uninitialized,
            },
            domains: Vec::new(),
            agents: BTreeMap::new(),
            storage: StorageSlots {
                date_app: StorageProfile::uninitialized(at),
            },
        }
    }

    pub fn revision(&self) -> u64 {
        self.meta.revision
    }

    pub fn find_domain(&self, host: &str) -> Option<&DomainRecord> {
        self.domains.iter().find(|d| d.domain == host)
    }

    pub fn storage_profile(&self) -> &StorageProfile {
        &self.storage.date_app
    }

    /// Hostnames of all records that carry one, in document order
    pub fn hostnames(&self) -> Vec<String> {
        self.domains
            .iter()
            .filter(|d| !d.domain.is_empty())
            .map(|d| d.domain.clone())
            .collect()
    }

    /// Recompute `meta` after a successful transform and advance the revision
    pub(crate) fn commit(&mut self, at: Timestamp) {
        self.domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        self.meta.updated_at = at;
        self.meta.revision += 1;
        self.meta.domain_count = self.domains.len();
        self.meta.agent_count = self.agents.len();
        self.meta.storage_status = self.storage.date_app.status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_starts_at_revision_zero() {
        let doc = StateDocument::empty(now());
        assert_eq!(doc.revision(), 0);
        assert_eq!(doc.storage_profile().status, StorageStatus::Uninitialized);
        assert!(doc.domains.is_empty());
        assert!(doc.agents.is_empty());
    }

    #[test]
    fn test_commit_refreshes_meta() {
        let mut doc = StateDocument::empty(now());
        doc.domains.push(DomainRecord {
            domain: "b.example.com".to_string(),
            ..Default::default()
        });
        doc.domains.push(DomainRecord {
            domain: "a.example.com".to_string(),
            ..Default::default()
        });
        doc.storage.date_app.status = StorageStatus::Ready;

        doc.commit(now());

        assert_eq!(doc.meta.revision, 1);
        assert_eq!(doc.meta.domain_count, 2);
        assert_eq!(doc.meta.agent_count, 0);
        assert_eq!(doc.meta.storage_status, StorageStatus::Ready);
        assert_eq!(doc.domains[0].domain, "a.example.com");
    }

    #[test]
    fn test_hostless_domain_entry_still_parses() {
        let raw = r#"{
            "meta": {"revision": 4},
            "domains": [{"target_service": "fastmcp"}, {"domain": "a.example.com"}],
            "agents": {}
        }"#;
        let doc: StateDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.revision(), 4);
        assert_eq!(doc.domains.len(), 2);
        assert_eq!(doc.hostnames(), vec!["a.example.com".to_string()]);
    }

    #[test]
    fn test_history_action_wire_names() {
        let entry = HistoryEntry {
            action: HistoryAction::SeededEnv,
            at: now(),
            target: Some("twinboss_api".to_string()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "seeded-env");
        assert_eq!(HistoryAction::EnsureAdmin.to_string(), "ensure-admin");
    }
}
