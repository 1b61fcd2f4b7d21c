// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Control Plane Application Service
//!
//! Transport-independent surface over the routing state: every mutation and
//! read the HTTP server and the CLI expose goes through [`ControlPlaneService`].
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Validate requests, commit them through the state
//!   store, regenerate the routing artifact, publish events
//! - **Collaborators:**
//!   - Domain: request planning, upsert rules, routing projection
//!   - Infrastructure: StateStore, RoutingConfigWriter, EventBus
//!
//! # Flow (mutations)
//!
//! 1. Validate and normalize the request (no lock held; rejections never
//!    bump the revision)
//! 2. Apply the upsert inside the store's exclusive section (persisted)
//! 3. Rewrite the routing artifact when domains changed, still inside that
//!    section so artifacts follow commit order
//! 4. Publish the matching `ControlPlaneEvent` once everything succeeded
//! 5. Return the affected record and the new revision

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::domain::events::ControlPlaneEvent;
use crate::domain::hostname::HostnameError;
use crate::domain::node_config::ControlPlaneConfig;
use crate::domain::routing::{RoutingConfigGenerator, ServicePorts};
use crate::domain::state::{
    AgentRecord, DomainRecord, HistoryAction, StateDocument, StateMeta, StorageProfile, Timestamp,
};
use crate::domain::upsert::{AgentRegistration, HostDomainRequest, RequestError, StorageSetupRequest};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::routing_writer::{RoutingConfigWriter, RoutingWriteError};
use crate::infrastructure::state_store::{ExclusiveSection, StateStore, StateStoreError};

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error(transparent)]
    InvalidDomain(#[from] HostnameError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Persistence(#[from] StateStoreError),

    /// The mutation is committed; only the artifact rewrite failed
    #[error(transparent)]
    RoutingArtifact(#[from] RoutingWriteError),
}

impl From<RequestError> for ControlPlaneError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::InvalidDomain(e) => ControlPlaneError::InvalidDomain(e),
            RequestError::Validation(msg) => ControlPlaneError::Validation(msg),
        }
    }
}

/// Result of a committed mutation
#[derive(Debug, Clone, Serialize)]
pub struct Mutated<T> {
    pub record: T,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeysPresent {
    pub openai: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub keys_present: KeysPresent,
    /// Seed hostnames and stored hostnames, sorted and unique
    pub domains: Vec<String>,
    pub meta: StateMeta,
}

/// Outcome of startup seeding
#[derive(Debug, Clone, Serialize)]
pub struct Bootstrap {
    pub seeded: Vec<String>,
    pub revision: u64,
}

pub struct ControlPlaneService {
    store: Arc<StateStore>,
    routing: Arc<RoutingConfigWriter>,
    event_bus: Arc<EventBus>,
    seed_hosts: Vec<String>,
    openai_key_present: bool,
}

impl ControlPlaneService {
    pub fn new(store: Arc<StateStore>, routing: Arc<RoutingConfigWriter>, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            routing,
            event_bus,
            seed_hosts: Vec::new(),
            openai_key_present: false,
        }
    }

    /// Wire the service from a loaded configuration
    pub fn from_config(config: &ControlPlaneConfig, event_bus: Arc<EventBus>) -> Result<Self, ControlPlaneError> {
        let store = StateStore::open(config.spec.paths.state_file())?;
        let routing = RoutingConfigWriter::new(
            config.spec.paths.routing_file.clone(),
            RoutingConfigGenerator::new(config.service_ports().clone()),
        );

        Ok(Self::new(Arc::new(store), Arc::new(routing), event_bus)
            .with_seed_hosts(config.seed_hosts())
            .with_openai_key_present(config.spec.generation.resolved_api_key().is_some()))
    }

    /// Hostnames (already canonical) merged in by [`Self::bootstrap`]
    pub fn with_seed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.seed_hosts = hosts;
        self
    }

    pub fn with_openai_key_present(mut self, present: bool) -> Self {
        self.openai_key_present = present;
        self
    }

    pub fn seed_hosts(&self) -> &[String] {
        &self.seed_hosts
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn service_ports(&self) -> &ServicePorts {
        self.routing.generator().ports()
    }

    /// Merge seed hostnames, then write the routing artifact once
    pub fn bootstrap(&self) -> Result<Bootstrap, ControlPlaneError> {
        let section = self.store.exclusive();
        let merged = self.seed_in(&section, &self.seed_hosts)?;
        let snapshot = match &merged {
            Some((snapshot, _)) => snapshot.clone(),
            None => section.current()?,
        };
        self.write_routes(&snapshot)?;
        drop(section);

        let seeded = match merged {
            Some((snapshot, added)) => self.publish_seeded(&snapshot, added).record,
            None => Vec::new(),
        };
        info!(
            seeded = seeded.len(),
            revision = snapshot.revision(),
            domains = snapshot.domains.len(),
            "Control plane bootstrapped"
        );
        Ok(Bootstrap {
            seeded,
            revision: snapshot.revision(),
        })
    }

    /// Add default records for hostnames not present yet.
    ///
    /// Returns `None` (and leaves the revision alone) when every hostname
    /// already exists. Does not touch the routing artifact.
    pub fn seed_domains_from(&self, hosts: &[String]) -> Result<Option<Mutated<Vec<String>>>, ControlPlaneError> {
        let merged = self.seed_in(&self.store.exclusive(), hosts)?;
        Ok(merged.map(|(snapshot, added)| self.publish_seeded(&snapshot, added)))
    }

    /// Rewrites the routing artifact before the exclusive section is
    /// released. The event is published only when the artifact is current.
    pub fn host_domain(&self, request: &HostDomainRequest) -> Result<Mutated<DomainRecord>, ControlPlaneError> {
        let plan = request
            .plan(self.service_ports())
            .map_err(|e| self.rejected("host_domain", e))?;

        let section = self.store.exclusive();
        let (snapshot, (record, action)) =
            self.commit_in(&section, "host_domain", |doc, at| doc.upsert_domain(&plan, at))?;
        self.write_routes(&snapshot)?;
        drop(section);

        let revision = snapshot.revision();
        let at = snapshot.meta.updated_at;
        let domain = record.domain.clone();
        self.event_bus.publish(match action {
            HistoryAction::Updated => ControlPlaneEvent::DomainUpdated { domain, revision, at },
            _ => ControlPlaneEvent::DomainProvisioned { domain, revision, at },
        });
        Ok(Mutated { record, revision })
    }

    pub fn setup_storage(&self, request: &StorageSetupRequest) -> Result<Mutated<StorageProfile>, ControlPlaneError> {
        let settings = request.plan().map_err(|e| self.rejected("setup_storage", e))?;

        let (snapshot, profile) = self.commit("setup_storage", |doc, at| doc.setup_storage(settings, at))?;

        self.event_bus.publish(ControlPlaneEvent::StorageReady {
            revision: snapshot.revision(),
            at: snapshot.meta.updated_at,
        });
        Ok(Mutated {
            record: profile,
            revision: snapshot.revision(),
        })
    }

    pub fn register_agent(&self, request: &AgentRegistration) -> Result<Mutated<AgentRecord>, ControlPlaneError> {
        let plan = request.plan().map_err(|e| self.rejected("register_agent", e))?;

        let (snapshot, record) = self.commit("register_agent", |doc, at| doc.upsert_agent(&plan, at))?;

        self.event_bus.publish(ControlPlaneEvent::AgentRegistered {
            slug: record.slug.clone(),
            revision: snapshot.revision(),
            at: snapshot.meta.updated_at,
        });
        Ok(Mutated {
            record,
            revision: snapshot.revision(),
        })
    }

    /// Idempotent admin provisioning. A blank name gets a timestamped one.
    pub fn ensure_agent(&self, name: &str) -> Result<Mutated<AgentRecord>, ControlPlaneError> {
        let name = match name.trim() {
            "" => format!("agent-{}", chrono::Utc::now().timestamp()),
            trimmed => trimmed.to_string(),
        };

        let (snapshot, record) = self.commit("ensure_agent", |doc, at| doc.ensure_agent(&name, at))?;

        self.event_bus.publish(ControlPlaneEvent::AgentEnsured {
            slug: record.slug.clone(),
            revision: snapshot.revision(),
            at: snapshot.meta.updated_at,
        });
        Ok(Mutated {
            record,
            revision: snapshot.revision(),
        })
    }

    pub fn list_domains(&self) -> Result<(Vec<DomainRecord>, u64), ControlPlaneError> {
        let doc = self.store.read()?;
        let revision = doc.revision();
        Ok((doc.domains, revision))
    }

    /// Agents sorted by display name
    pub fn list_agents(&self) -> Result<(Vec<AgentRecord>, u64), ControlPlaneError> {
        let doc = self.store.read()?;
        let revision = doc.revision();
        let mut agents: Vec<AgentRecord> = doc.agents.into_values().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        Ok((agents, revision))
    }

    pub fn storage_profile(&self) -> Result<StorageProfile, ControlPlaneError> {
        Ok(self.store.read()?.storage.date_app)
    }

    pub fn config_summary(&self) -> Result<ConfigSummary, ControlPlaneError> {
        let doc = self.store.read()?;
        let domains: BTreeSet<String> = self
            .seed_hosts
            .iter()
            .cloned()
            .chain(doc.hostnames())
            .collect();

        Ok(ConfigSummary {
            keys_present: KeysPresent {
                openai: self.openai_key_present,
            },
            domains: domains.into_iter().collect(),
            meta: doc.meta,
        })
    }

    /// Routing artifact for the current state, without writing it
    pub fn render_routes(&self) -> Result<String, ControlPlaneError> {
        Ok(self.routing.render(&self.store.read()?))
    }

    /// Stored hostnames, or the seed hostnames when none are stored
    pub fn known_hosts(&self) -> Result<Vec<String>, ControlPlaneError> {
        let stored = self.store.read()?.hostnames();
        if stored.is_empty() {
            Ok(self.seed_hosts.clone())
        } else {
            Ok(stored)
        }
    }

    fn commit<R, F>(&self, operation: &'static str, transform: F) -> Result<(StateDocument, R), ControlPlaneError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> R,
    {
        self.commit_in(&self.store.exclusive(), operation, transform)
    }

    fn commit_in<R, F>(
        &self,
        section: &ExclusiveSection<'_>,
        operation: &'static str,
        transform: F,
    ) -> Result<(StateDocument, R), ControlPlaneError>
    where
        F: FnOnce(&mut StateDocument, Timestamp) -> R,
    {
        let (snapshot, output) = section.mutate(transform).map_err(|e| self.failed(operation, e))?;
        self.committed(operation, &snapshot);
        Ok((snapshot, output))
    }

    /// `None` when there is nothing to seed or every hostname already exists
    fn seed_in(
        &self,
        section: &ExclusiveSection<'_>,
        hosts: &[String],
    ) -> Result<Option<(StateDocument, Vec<String>)>, ControlPlaneError> {
        if hosts.is_empty() {
            return Ok(None);
        }

        let ports = self.service_ports().clone();
        let committed = section
            .mutate_if(|doc, at| {
                let added = doc.seed_domains(hosts, &ports, at);
                if added.is_empty() {
                    None
                } else {
                    Some(added)
                }
            })
            .map_err(|e| self.failed("seed_domains", e))?;

        match &committed {
            Some((snapshot, _)) => self.committed("seed_domains", snapshot),
            None => info!("Seed domains already present, nothing to merge"),
        }
        Ok(committed)
    }

    fn publish_seeded(&self, snapshot: &StateDocument, added: Vec<String>) -> Mutated<Vec<String>> {
        self.event_bus.publish(ControlPlaneEvent::DomainsSeeded {
            domains: added.clone(),
            revision: snapshot.revision(),
            at: snapshot.meta.updated_at,
        });
        Mutated {
            record: added,
            revision: snapshot.revision(),
        }
    }

    fn committed(&self, operation: &'static str, snapshot: &StateDocument) {
        metrics::counter!("twinboss_mutations_total", "operation" => operation).increment(1);
        info!(operation, revision = snapshot.revision(), "Mutation committed");
    }

    fn failed(&self, operation: &'static str, err: StateStoreError) -> ControlPlaneError {
        metrics::counter!("twinboss_mutation_failures_total", "operation" => operation).increment(1);
        error!(operation, "Mutation failed: {}", err);
        ControlPlaneError::Persistence(err)
    }

    fn rejected(&self, operation: &'static str, err: RequestError) -> ControlPlaneError {
        metrics::counter!("twinboss_mutation_failures_total", "operation" => operation).increment(1);
        info!(operation, "Mutation rejected: {}", err);
        err.into()
    }

    fn write_routes(&self, snapshot: &StateDocument) -> Result<(), ControlPlaneError> {
        self.routing.write(snapshot).map_err(|e| {
            error!(revision = snapshot.revision(), "Routing artifact not updated: {}", e);
            ControlPlaneError::RoutingArtifact(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ControlPlaneService {
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        let routing = RoutingConfigWriter::new(
            dir.path().join("domains.yml"),
            RoutingConfigGenerator::new(ServicePorts::default()),
        );
        ControlPlaneService::new(Arc::new(store), Arc::new(routing), Arc::new(EventBus::new(16)))
    }

    #[test]
    fn test_rejected_request_keeps_revision() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let err = svc.host_domain(&HostDomainRequest::new("a.example.com")).unwrap_err();
        assert!(matches!(err, ControlPlaneError::Validation(_)));
        let err = svc
            .host_domain(&HostDomainRequest::new("exa mple").with_service("twinboss_api"))
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::InvalidDomain(_)));

        assert_eq!(svc.list_domains().unwrap().1, 0);
    }

    #[test]
    fn test_ensure_agent_blank_name() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let created = svc.ensure_agent("   ").unwrap();
        assert!(created.record.name.starts_with("agent-"));
        assert_eq!(created.record.rights, "admin");
        assert_eq!(created.revision, 1);
    }

    #[test]
    fn test_known_hosts_falls_back_to_seeds() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).with_seed_hosts(vec!["seed.example.com".to_string()]);
        assert_eq!(svc.known_hosts().unwrap(), vec!["seed.example.com".to_string()]);

        svc.host_domain(&HostDomainRequest::new("shop.example.com").with_service("fastmcp"))
            .unwrap();
        assert_eq!(svc.known_hosts().unwrap(), vec!["shop.example.com".to_string()]);
    }
}
