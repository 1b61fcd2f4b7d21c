// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Record Upsert Logic
//!
//! Idempotent create-or-update semantics for the three record kinds owned by
//! [`StateDocument`]. Requests are validated into plans *before* the store's
//! exclusive section is entered, so a rejected request never reaches
//! `StateStore::mutate` and never bumps the revision.
//!
//! | Request | Key | Merge | History |
//! |---------|-----|-------|---------|
//! | `HostDomainRequest` | canonical hostname | full replace | `provisioned` / `updated` |
//! | `AgentRegistration` | slug | replace, union for capabilities and domains | `registered` |
//! | `ensure_agent` | slug | admin defaults, sets untouched | `ensure-admin` |
//! | `StorageSetupRequest` | `date_app` slot | full replace | - |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::hostname::{self, HostnameError};
use crate::domain::routing::{ServicePorts, ENTRYPOINT_PLAIN, ENTRYPOINT_SECURE};
use crate::domain::state::{
    AgentRecord, DomainRecord, HistoryAction, HistoryEntry, StateDocument, StorageProfile,
    StorageSettings, StorageStatus, Timestamp,
};

/// Backend every environment-seeded hostname is routed to
pub const SEED_TARGET_SERVICE: &str = "twinboss_api";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error(transparent)]
    InvalidDomain(#[from] HostnameError),

    #[error("{0}")]
    Validation(String),
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_true() -> bool {
    true
}

fn non_blank<S: AsRef<str>>(value: Option<S>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Request to route a hostname to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDomainRequest {
    pub domain: String,
    #[serde(default)]
    pub target_service: Option<String>,
    #[serde(default)]
    pub target_port: Option<u16>,
    #[serde(default = "default_scheme")]
    pub target_scheme: String,
    #[serde(default)]
    pub target_url: Option<String>,
    /// Entry channel; derived from `auto_ssl` when absent
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default = "default_true")]
    pub auto_ssl: bool,
    #[serde(default = "default_true")]
    pub redirect_to_https: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl HostDomainRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            target_service: None,
            target_port: None,
            target_scheme: default_scheme(),
            target_url: None,
            entrypoint: None,
            auto_ssl: true,
            redirect_to_https: true,
            notes: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.target_service = Some(service.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    /// Validate the request and resolve every derived field.
    ///
    /// Fails with `Validation` when neither a target service nor a target URL
    /// is given or when the entrypoint is not route-safe, and with
    /// `InvalidDomain` when the hostname is unusable.
    pub fn plan(&self, ports: &ServicePorts) -> Result<DomainPlan, RequestError> {
        let target_service = non_blank(self.target_service.as_deref());
        let target_url = non_blank(self.target_url.as_deref())
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if target_service.is_none() && target_url.is_none() {
            return Err(RequestError::Validation(
                "target_service or target_url is required".to_string(),
            ));
        }

        let domain = hostname::normalize(&self.domain)?;

        let target_port = match &target_service {
            Some(service) => Some(self.target_port.unwrap_or_else(|| ports.port_for(service))),
            None => self.target_port,
        };

        if let Some(requested) = non_blank(self.entrypoint.as_deref()) {
            if hostname::route_safe_name(&requested) != requested {
                return Err(RequestError::Validation(format!(
                    "entrypoint {requested:?} may only contain letters, digits, '-' and '_'"
                )));
            }
        }

        let entrypoint = non_blank(self.entrypoint.as_deref()).unwrap_or_else(|| {
            if self.auto_ssl {
                ENTRYPOINT_SECURE.to_string()
            } else {
                ENTRYPOINT_PLAIN.to_string()
            }
        });

        Ok(DomainPlan {
            domain,
            target_service,
            target_url,
            target_port,
            target_scheme: non_blank(Some(&self.target_scheme)).unwrap_or_else(default_scheme),
            entrypoint,
            auto_ssl: self.auto_ssl,
            redirect_to_https: self.redirect_to_https,
            notes: self.notes.clone(),
        })
    }
}

/// A validated host-domain request with every field resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPlan {
    pub domain: String,
    pub target_service: Option<String>,
    pub target_url: Option<String>,
    pub target_port: Option<u16>,
    pub target_scheme: String,
    pub entrypoint: String,
    pub auto_ssl: bool,
    pub redirect_to_https: bool,
    pub notes: Option<String>,
}

impl DomainPlan {
    fn target(&self) -> Option<String> {
        self.target_service.clone().or_else(|| self.target_url.clone())
    }
}

/// Request to register (or re-register) an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_rights")]
    pub rights: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

fn default_role() -> String {
    "generalist".to_string()
}

fn default_rights() -> String {
    "member".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

impl AgentRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: default_role(),
            rights: default_rights(),
            status: default_status(),
            endpoint: None,
            capabilities: Vec::new(),
            domains: Vec::new(),
        }
    }

    pub fn plan(&self) -> Result<AgentPlan, RequestError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(RequestError::Validation("name is required".to_string()));
        }

        let capabilities = self
            .capabilities
            .iter()
            .map(|cap| cap.trim().to_lowercase())
            .filter(|cap| !cap.is_empty())
            .collect();

        Ok(AgentPlan {
            name: name.to_string(),
            slug: hostname::slugify(name),
            role: self.role.clone(),
            rights: self.rights.clone(),
            status: self.status.clone(),
            endpoint: non_blank(self.endpoint.as_deref()),
            capabilities,
            domains: hostname::normalize_many(&self.domains).into_iter().collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPlan {
    pub name: String,
    pub slug: String,
    pub role: String,
    pub rights: String,
    pub status: String,
    pub endpoint: Option<String>,
    pub capabilities: BTreeSet<String>,
    pub domains: BTreeSet<String>,
}

/// Request to (re)configure the storage profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSetupRequest {
    #[serde(default = "default_engine")]
    pub storage_engine: String,
    #[serde(default = "default_region")]
    pub primary_region: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_retention")]
    pub retention_days: u32,
    #[serde(default)]
    pub backup_regions: Vec<String>,
    #[serde(default)]
    pub analytics: bool,
    #[serde(default = "default_true")]
    pub encryption: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_engine() -> String {
    "postgres".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_replicas() -> u32 {
    1
}

fn default_retention() -> u32 {
    365
}

impl Default for StorageSetupRequest {
    fn default() -> Self {
        Self {
            storage_engine: default_engine(),
            primary_region: default_region(),
            replicas: default_replicas(),
            retention_days: default_retention(),
            backup_regions: Vec::new(),
            analytics: false,
            encryption: true,
            notes: None,
        }
    }
}

impl StorageSetupRequest {
    pub fn plan(&self) -> Result<StorageSettings, RequestError> {
        let storage_engine = non_blank(Some(&self.storage_engine))
            .ok_or_else(|| RequestError::Validation("storage_engine is required".to_string()))?;
        let primary_region = non_blank(Some(&self.primary_region))
            .ok_or_else(|| RequestError::Validation("primary_region is required".to_string()))?;

        Ok(StorageSettings {
            storage_engine,
            primary_region,
            replicas: self.replicas,
            retention_days: self.retention_days,
            backup_regions: self
                .backup_regions
                .iter()
                .filter_map(|r| non_blank(Some(r)))
                .collect(),
            analytics: self.analytics,
            encryption: self.encryption,
            notes: self.notes.clone(),
        })
    }
}

impl StateDocument {
    /// Create or update the record for `plan.domain`.
    ///
    /// Returns a copy of the resulting record and whether it was newly
    /// provisioned. `domain`, `id` and `created_at` survive updates; history
    /// only grows.
    pub fn upsert_domain(&mut self, plan: &DomainPlan, at: Timestamp) -> (DomainRecord, HistoryAction) {
        let position = self.domains.iter().position(|d| d.domain == plan.domain);
        let action = if position.is_some() {
            HistoryAction::Updated
        } else {
            HistoryAction::Provisioned
        };

        let index = match position {
            Some(index) => index,
            None => {
                self.domains.push(DomainRecord {
                    domain: plan.domain.clone(),
                    id: hostname::fingerprint(&plan.domain),
                    created_at: at,
                    ..Default::default()
                });
                self.domains.len() - 1
            }
        };

        let entry = &mut self.domains[index];
        entry.target_service = plan.target_service.clone();
        entry.target_port = plan.target_port;
        entry.target_scheme = plan.target_scheme.clone();
        entry.target_url = plan.target_url.clone();
        entry.entrypoint = plan.entrypoint.clone();
        entry.auto_ssl = plan.auto_ssl;
        entry.redirect_to_https = plan.redirect_to_https;
        entry.notes = plan.notes.clone();
        entry.updated_at = at;
        if plan.target_service.is_some() {
            entry.service_name = plan.target_service.clone();
        }
        if entry.router_name.is_none() {
            entry.router_name = Some(hostname::route_safe_name(&entry.domain));
        }
        entry.history.push(HistoryEntry {
            action,
            at,
            target: plan.target(),
        });

        let record = entry.clone();
        self.domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        (record, action)
    }

    /// Add a default record for every seed hostname not yet present.
    ///
    /// Returns the hostnames that were added.
    pub fn seed_domains(&mut self, hosts: &[String], ports: &ServicePorts, at: Timestamp) -> Vec<String> {
        let mut added = Vec::new();
        for host in hosts {
            if host.is_empty() || self.find_domain(host).is_some() {
                continue;
            }
            self.domains.push(DomainRecord {
                domain: host.clone(),
                id: hostname::fingerprint(host),
                created_at: at,
                updated_at: at,
                target_service: Some(SEED_TARGET_SERVICE.to_string()),
                target_url: None,
                target_port: Some(ports.port_for(SEED_TARGET_SERVICE)),
                target_scheme: default_scheme(),
                entrypoint: ENTRYPOINT_PLAIN.to_string(),
                auto_ssl: true,
                redirect_to_https: true,
                notes: None,
                service_name: Some(SEED_TARGET_SERVICE.to_string()),
                router_name: Some(hostname::route_safe_name(host)),
                history: vec![HistoryEntry {
                    action: HistoryAction::SeededEnv,
                    at,
                    target: Some(SEED_TARGET_SERVICE.to_string()),
                }],
            });
            added.push(host.clone());
        }
        self.domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        added
    }

    /// Create or update the agent keyed by `plan.slug`
    pub fn upsert_agent(&mut self, plan: &AgentPlan, at: Timestamp) -> AgentRecord {
        let record = self
            .agents
            .entry(plan.slug.clone())
            .or_insert_with(|| AgentRecord {
                slug: plan.slug.clone(),
                created_at: at,
                ..Default::default()
            });

        record.name = plan.name.clone();
        record.role = plan.role.clone();
        record.rights = plan.rights.clone();
        record.status = plan.status.clone();
        record.endpoint = plan.endpoint.clone();
        record.capabilities.extend(plan.capabilities.iter().cloned());
        record.domains.extend(plan.domains.iter().cloned());
        record.updated_at = at;
        record.history.push(HistoryEntry {
            action: HistoryAction::Registered,
            at,
            target: None,
        });
        record.clone()
    }

    /// Make sure an admin agent named `name` exists.
    ///
    /// Capabilities, domains and endpoint of an existing record are kept.
    pub fn ensure_agent(&mut self, name: &str, at: Timestamp) -> AgentRecord {
        let slug = hostname::slugify(name);
        let record = self
            .agents
            .entry(slug.clone())
            .or_insert_with(|| AgentRecord {
                slug,
                created_at: at,
                ..Default::default()
            });

        record.name = name.to_string();
        record.rights = "admin".to_string();
        record.role = "generalist".to_string();
        record.status = "ready".to_string();
        record.updated_at = at;
        record.history.push(HistoryEntry {
            action: HistoryAction::EnsureAdmin,
            at,
            target: None,
        });
        record.clone()
    }

    /// Replace the storage profile settings and mark the slot ready
    pub fn setup_storage(&mut self, settings: StorageSettings, at: Timestamp) -> StorageProfile {
        let profile = &mut self.storage.date_app;
        profile.created_at.get_or_insert(at);
        profile.settings = Some(settings);
        profile.status = StorageStatus::Ready;
        profile.updated_at = at;
        profile.clone()
    }
}
