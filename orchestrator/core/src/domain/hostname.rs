// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hostname Normalizer Domain Service
//!
//! Turns arbitrary user-supplied host strings (`HTTPS://Shop.Example.com/`,
//! `shop.example.com:8443`, ` shop.example.com `) into canonical lowercase
//! hostnames, and derives the other stable keys used by the routing state:
//! agent slugs, record fingerprints and route-safe names.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure key derivation, no I/O

use std::collections::BTreeSet;

use thiserror::Error;
use url::{Host, Url};

/// Scheme prepended when the raw value carries none
const DEFAULT_SCHEME: &str = "http:";

/// Number of hash bytes kept in a record fingerprint
const FINGERPRINT_BYTES: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostnameError {
    #[error("invalid domain '{0}'")]
    InvalidDomain(String),
}

/// Normalize a single host string (strict path).
///
/// Whitespace is trimmed, a default scheme is prepended when no `//`
/// separator is present, and only the host component of the parsed URI is
/// kept, lowercased.
///
/// # Examples
/// ```
/// use twinboss_core::domain::hostname::normalize;
///
/// assert_eq!(normalize("HTTPS://A.example.com/").unwrap(), "a.example.com");
/// assert_eq!(normalize("a.example.com:8080/path").unwrap(), "a.example.com");
/// assert!(normalize("   ").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String, HostnameError> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(HostnameError::InvalidDomain(raw.to_string()));
    }

    let candidate = if candidate.starts_with("//") {
        format!("{DEFAULT_SCHEME}{candidate}")
    } else if candidate.contains("//") {
        candidate.to_string()
    } else {
        format!("{DEFAULT_SCHEME}//{candidate}")
    };

    let parsed =
        Url::parse(&candidate).map_err(|_| HostnameError::InvalidDomain(raw.to_string()))?;

    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Err(HostnameError::InvalidDomain(raw.to_string())),
    };

    if host.is_empty() {
        return Err(HostnameError::InvalidDomain(raw.to_string()));
    }

    Ok(host.to_lowercase())
}

/// Normalize a batch of host strings (lenient path).
///
/// Entries that fail normalization are dropped. The result is sorted and
/// free of duplicates.
pub fn normalize_many<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique = BTreeSet::new();
    for item in raw {
        match normalize(item.as_ref()) {
            Ok(host) => {
                unique.insert(host);
            }
            Err(e) => tracing::debug!("Dropping unusable host entry: {}", e),
        }
    }
    unique.into_iter().collect()
}

/// Short stable fingerprint (12 hex chars) of an arbitrary key
pub fn fingerprint(value: &str) -> String {
    let digest = blake3::hash(value.as_bytes());
    hex::encode(&digest.as_bytes()[..FINGERPRINT_BYTES])
}

/// Derive an agent slug from its display name.
///
/// Lowercases, turns every run of non-alphanumeric characters into a single
/// `-`, and trims separators at both ends. Names without any alphanumeric
/// character fall back to `agent-<fingerprint>`.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        format!("agent-{}", fingerprint(name.trim()))
    } else {
        slug
    }
}

/// Derive a router/backend name that is safe for file-provider keys.
///
/// Keeps ASCII alphanumerics, `-` and `_`; every other character becomes `-`.
pub fn route_safe_name(value: &str) -> String {
    let mapped: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}
