// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Routing Artifact Writer
//
// Renders the dynamic routing file from a committed state snapshot and
// replaces it atomically. Callers write while holding the state store's
// exclusive section, so artifacts land in commit order; the writer itself
// keeps no ordering of its own. A document recreated after corruption
// restarts at revision 0 and must still overwrite the old artifact.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::info;

use crate::domain::routing::RoutingConfigGenerator;
use crate::domain::state::StateDocument;
use crate::infrastructure::state_store::write_atomic;

#[derive(Debug, thiserror::Error)]
#[error("failed to write routing config to {}: {source}", path.display())]
pub struct RoutingWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub struct RoutingConfigWriter {
    path: PathBuf,
    generator: RoutingConfigGenerator,
    last_revision: Mutex<Option<u64>>,
}

impl RoutingConfigWriter {
    pub fn new(path: impl Into<PathBuf>, generator: RoutingConfigGenerator) -> Self {
        Self {
            path: path.into(),
            generator,
            last_revision: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generator(&self) -> &RoutingConfigGenerator {
        &self.generator
    }

    pub fn render(&self, snapshot: &StateDocument) -> String {
        self.generator.generate(&snapshot.domains)
    }

    /// Render `snapshot` and replace the artifact with it
    pub fn write(&self, snapshot: &StateDocument) -> Result<(), RoutingWriteError> {
        let mut last = self.last_revision.lock();
        let revision = snapshot.revision();

        let yaml = self.render(snapshot);
        write_atomic(&self.path, yaml.as_bytes()).map_err(|source| RoutingWriteError {
            path: self.path.clone(),
            source,
        })?;
        *last = Some(revision);

        info!(
            path = %self.path.display(),
            revision,
            domains = snapshot.domains.len(),
            "Routing config written"
        );
        Ok(())
    }

    /// Revision of the snapshot most recently written by this writer
    pub fn last_written_revision(&self) -> Option<u64> {
        *self.last_revision.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::ServicePorts;
    use crate::domain::state::now;
    use crate::domain::upsert::HostDomainRequest;
    use tempfile::TempDir;

    fn snapshot_with(hosts: &[&str], revision: u64) -> StateDocument {
        let ports = ServicePorts::default();
        let mut doc = StateDocument::empty(now());
        for host in hosts {
            let plan = HostDomainRequest::new(*host)
                .with_service("twinboss_api")
                .plan(&ports)
                .unwrap();
            doc.upsert_domain(&plan, now());
        }
        doc.meta.revision = revision;
        doc
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traefik").join("dynamic").join("domains.yml");
        let writer = RoutingConfigWriter::new(&path, RoutingConfigGenerator::new(ServicePorts::default()));

        writer.write(&snapshot_with(&["a.example.com"], 1)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Host(`a.example.com`)"));
        assert_eq!(writer.last_written_revision(), Some(1));
    }

    #[test]
    fn test_lower_revision_after_recreation_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("domains.yml");
        let writer = RoutingConfigWriter::new(&path, RoutingConfigGenerator::new(ServicePorts::default()));

        writer.write(&snapshot_with(&["a.example.com", "b.example.com"], 5)).unwrap();
        writer.write(&snapshot_with(&["new.example.com"], 1)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("new.example.com"));
        assert!(!written.contains("b.example.com"));
        assert_eq!(writer.last_written_revision(), Some(1));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("domains.yml");
        std::fs::create_dir_all(&path).unwrap();
        let writer = RoutingConfigWriter::new(&path, RoutingConfigGenerator::new(ServicePorts::default()));

        let err = writer.write(&snapshot_with(&[], 3)).unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(writer.last_written_revision(), None);
    }
}
