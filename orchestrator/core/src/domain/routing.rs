// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dynamic Routing Configuration
//!
//! Pure projection of the domain records into the edge router's file-provider
//! document (Traefik dynamic configuration). The artifact is recomputed
//! wholesale on every change; there is no incremental patching.
//!
//! # Output layout
//!
//! ```text
//! http:
//!   middlewares:          (only when some record redirects to HTTPS)
//!   routers:              (one per hostname, or a single placeholder)
//!   services:             (one per distinct backend name)
//! ```
//!
//! The output depends only on the *set* of records: records are ordered by
//! hostname before rendering and backend URLs are deduplicated and sorted, so
//! insertion order never shows up in the text.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::hostname::route_safe_name;
use crate::domain::state::DomainRecord;

pub const ENTRYPOINT_PLAIN: &str = "web";
pub const ENTRYPOINT_SECURE: &str = "websecure";
pub const REDIRECT_MIDDLEWARE: &str = "redirect-to-https";

const PLACEHOLDER_ROUTER: &str = "placeholder";
const PLACEHOLDER_RULE: &str = "HostRegexp(`{any:.+}`)";
const PLACEHOLDER_SERVICE: &str = "noop";
const PLACEHOLDER_URL: &str = "http://127.0.0.1:9000";

/// Service assumed when a record names neither a service nor a URL
const FALLBACK_SERVICE: &str = "twinboss_api";
const FALLBACK_PORT: u16 = 80;

/// Default port per backend service name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServicePorts(BTreeMap<String, u16>);

impl Default for ServicePorts {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("twinboss_api".to_string(), 9000),
            ("fastmcp".to_string(), 8080),
            ("mcpjungle".to_string(), 4000),
            ("docker_mcp".to_string(), 8090),
        ]))
    }
}

impl ServicePorts {
    pub fn new(ports: BTreeMap<String, u16>) -> Self {
        Self(ports)
    }

    /// Configured port for `service`, or 80 for unknown services
    pub fn port_for(&self, service: &str) -> u16 {
        self.0.get(service).copied().unwrap_or(FALLBACK_PORT)
    }

    pub fn insert(&mut self, service: impl Into<String>, port: u16) {
        self.0.insert(service.into(), port);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u16)> {
        self.0.iter()
    }
}

/// Renders domain records into the dynamic routing artifact
#[derive(Debug, Clone, Default)]
pub struct RoutingConfigGenerator {
    ports: ServicePorts,
}

impl RoutingConfigGenerator {
    pub fn new(ports: ServicePorts) -> Self {
        Self { ports }
    }

    pub fn ports(&self) -> &ServicePorts {
        &self.ports
    }

    /// Render the full artifact. Never fails; unusable records are skipped.
    pub fn generate(&self, domains: &[DomainRecord]) -> String {
        let mut records: Vec<&DomainRecord> = domains
            .iter()
            .filter(|record| {
                let routable = is_routable_host(&record.domain);
                if !routable {
                    tracing::debug!("Skipping domain record without a usable hostname (id={:?})", record.id);
                }
                routable
            })
            .collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain).then_with(|| a.id.cmp(&b.id)));

        let mut lines: Vec<String> = vec!["http:".to_string()];

        if records.iter().any(|r| r.redirect_to_https) {
            lines.extend(
                [
                    "  middlewares:".to_string(),
                    format!("    {REDIRECT_MIDDLEWARE}:"),
                    "      redirectScheme:".to_string(),
                    "        scheme: https".to_string(),
                    "        permanent: true".to_string(),
                ],
            );
        }

        lines.push("  routers:".to_string());
        let mut used_routers: HashSet<String> = HashSet::new();
        let mut backends: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for record in &records {
            let mut router = router_name(record);
            if !used_routers.insert(router.clone()) {
                router = format!("{}-{}", router, record.id);
                used_routers.insert(router.clone());
            }
            let service = service_name(record);
            let entrypoint = entrypoint(record);

            lines.push(format!("    {router}:"));
            lines.push(format!("      rule: Host(`{}`)", record.domain));
            lines.push("      entryPoints:".to_string());
            lines.push(format!("        - {entrypoint}"));
            lines.push(format!("      service: {service}"));
            if record.redirect_to_https && entrypoint != ENTRYPOINT_SECURE {
                lines.push("      middlewares:".to_string());
                lines.push(format!("        - {REDIRECT_MIDDLEWARE}"));
            }

            backends.entry(service).or_default().insert(self.target_url(record));
        }

        if records.is_empty() {
            lines.push(format!("    {PLACEHOLDER_ROUTER}:"));
            lines.push(format!("      rule: {PLACEHOLDER_RULE}"));
            lines.push(format!("      service: {PLACEHOLDER_SERVICE}"));
            backends
                .entry(PLACEHOLDER_SERVICE.to_string())
                .or_default()
                .insert(PLACEHOLDER_URL.to_string());
        }

        lines.push("  services:".to_string());
        for (service, urls) in &backends {
            lines.push(format!("    {service}:"));
            lines.push("      loadBalancer:".to_string());
            lines.push("        servers:".to_string());
            for url in urls {
                lines.push(format!("          - url: {}", quote(url)));
            }
        }

        let mut artifact = lines.join("\n");
        artifact.push('\n');
        artifact
    }

    /// Effective backend URL of a record.
    ///
    /// `target_url` wins (without trailing slash); otherwise
    /// `scheme://service:port` with the port taken from the service table when
    /// the record has none.
    pub fn target_url(&self, record: &DomainRecord) -> String {
        if let Some(url) = record.target_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }

        let scheme = match record.target_scheme.trim() {
            "" => "http",
            scheme => scheme,
        };
        let service = record
            .target_service
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_SERVICE);
        let port = record.target_port.unwrap_or_else(|| self.ports.port_for(service));
        format!("{scheme}://{service}:{port}")
    }
}

fn is_routable_host(domain: &str) -> bool {
    !domain.trim().is_empty() && !domain.chars().any(|c| c == '`' || c.is_whitespace())
}

fn router_name(record: &DomainRecord) -> String {
    record
        .router_name
        .as_deref()
        .map(route_safe_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| route_safe_name(&record.domain))
}

fn service_name(record: &DomainRecord) -> String {
    record
        .service_name
        .as_deref()
        .or(record.target_service.as_deref())
        .map(route_safe_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            let suffix = if record.id.is_empty() {
                route_safe_name(&record.domain)
            } else {
                route_safe_name(&record.id)
            };
            format!("svc-{suffix}")
        })
}

/// Stored entrypoint reduced to route-safe characters, or the default channel
fn entrypoint(record: &DomainRecord) -> String {
    match route_safe_name(&record.entrypoint) {
        name if !name.is_empty() => name,
        _ if record.auto_ssl => ENTRYPOINT_SECURE.to_string(),
        _ => ENTRYPOINT_PLAIN.to_string(),
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
