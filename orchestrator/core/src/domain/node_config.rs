// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Control Plane Configuration Types
//
// Defines the configuration schema for a Twin Boss control plane, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - State and routing artifact locations
// - Backend service port table
// - HTTP API settings
// - Content generation provider settings
// - Hostnames seeded at startup

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::hostname;
use crate::domain::routing::ServicePorts;

pub const API_VERSION: &str = "twinboss.dev/v1";
pub const KIND: &str = "ControlPlaneConfig";

/// Top-level Kubernetes-style control plane manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// API version (must be "twinboss.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ControlPlaneConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ControlPlaneSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable control plane name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlPlaneSpec {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// Hostnames merged into the domain collection at startup (lenient)
    #[serde(default)]
    pub seed_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding runtime state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// State document; defaults to `<data_dir>/state.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Dynamic routing artifact watched by the edge router
    #[serde(default = "default_routing_file")]
    pub routing_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_file: None,
            routing_file: default_routing_file(),
        }
    }
}

impl PathsConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("state.json"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Default port per backend service name
    #[serde(default)]
    pub service_ports: ServicePorts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Shared key expected in the `x-api-key` header; open when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_seconds: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Resolve the configured key, following "env:VAR_NAME" indirection
    pub fn resolved_api_key(&self) -> Option<String> {
        let raw = self.openai_api_key.as_deref()?.trim();
        let key = match raw.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok()?,
            None => raw.to_string(),
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("runtime")
}

fn default_routing_file() -> PathBuf {
    PathBuf::from("config/traefik/dynamic/domains.yml")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    9000
}

fn default_generation_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_generation_timeout() -> u64 {
    60
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "twinboss".to_string(),
                labels: None,
            },
            spec: ControlPlaneSpec::default(),
        }
    }
}

impl ControlPlaneConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. TWINBOSS_CONFIG_PATH environment variable
    /// 2. ./twinboss-config.yaml (working directory)
    /// 3. ~/.twinboss/config.yaml (user home)
    /// 4. /etc/twinboss/config.yaml (system, Unix) or C:\ProgramData\TwinBoss\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TWINBOSS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./twinboss-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".twinboss").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/twinboss/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\TwinBoss\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from an explicit set of variables
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut seeds: Vec<(String, String)> = Vec::new();

        for (key, value) in vars {
            let value = value.trim().to_string();
            match key.as_str() {
                "TB_DATA_DIR" if !value.is_empty() => {
                    tracing::info!("Environment override: TB_DATA_DIR={}", value);
                    self.spec.paths.data_dir = PathBuf::from(value);
                }
                "TB_STATE_FILE" if !value.is_empty() => {
                    tracing::info!("Environment override: TB_STATE_FILE={}", value);
                    self.spec.paths.state_file = Some(PathBuf::from(value));
                }
                "TRAEFIK_DYNAMIC_FILE" if !value.is_empty() => {
                    tracing::info!("Environment override: TRAEFIK_DYNAMIC_FILE={}", value);
                    self.spec.paths.routing_file = PathBuf::from(value);
                }
                "LOCAL_API_KEY" => {
                    self.spec.api.api_key = if value.is_empty() { None } else { Some(value) };
                }
                "OPENAI_API_KEY" if !value.is_empty() => {
                    self.spec.generation.openai_api_key = Some(value);
                }
                "DOMAINS" => {
                    for host in value.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                        seeds.push((key.clone(), host.to_string()));
                    }
                }
                _ if key.starts_with("DOMAIN_") && !value.is_empty() => {
                    seeds.push((key.clone(), value));
                }
                _ => {}
            }
        }

        if !seeds.is_empty() {
            // env iteration order is unspecified; keep the result stable
            seeds.sort();
            self.spec
                .seed_domains
                .extend(seeds.into_iter().map(|(_, host)| host));
        }
    }

    /// Seed hostnames after lenient normalization
    pub fn seed_hosts(&self) -> Vec<String> {
        hostname::normalize_many(&self.spec.seed_domains)
    }

    pub fn service_ports(&self) -> &ServicePorts {
        &self.spec.routing.service_ports
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.api.port == 0 {
            anyhow::bail!("spec.api.port cannot be 0");
        }

        if self.spec.paths.state_file().as_os_str().is_empty() {
            anyhow::bail!("spec.paths.state_file cannot be empty");
        }

        if self.spec.paths.routing_file.as_os_str().is_empty() {
            anyhow::bail!("spec.paths.routing_file cannot be empty");
        }

        for (service, port) in self.spec.routing.service_ports.iter() {
            if *port == 0 {
                anyhow::bail!("Port for service '{}' cannot be 0", service);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.paths.state_file(), PathBuf::from("runtime/state.json"));
        assert_eq!(config.service_ports().port_for("twinboss_api"), 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing_with_partial_spec() {
        let yaml = r#"
apiVersion: twinboss.dev/v1
kind: ControlPlaneConfig
metadata:
  name: edge-1
spec:
  paths:
    data_dir: /var/lib/twinboss
  routing:
    service_ports:
      billing: 7100
  seed_domains:
    - HTTPS://Shop.Example.com/
    - "not a host"
"#;
        let config = ControlPlaneConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "edge-1");
        assert_eq!(
            config.spec.paths.state_file(),
            PathBuf::from("/var/lib/twinboss/state.json")
        );
        assert_eq!(config.service_ports().port_for("billing"), 7100);
        assert_eq!(config.service_ports().port_for("twinboss_api"), 80);
        assert_eq!(config.seed_hosts(), vec!["shop.example.com".to_string()]);
        assert_eq!(config.spec.api.port, 9000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ControlPlaneConfig::default();
        config.apply_overrides(vec![
            ("TB_STATE_FILE".to_string(), "/tmp/tb/state.json".to_string()),
            ("TRAEFIK_DYNAMIC_FILE".to_string(), "/tmp/tb/domains.yml".to_string()),
            ("LOCAL_API_KEY".to_string(), "secret".to_string()),
            ("DOMAINS".to_string(), "a.example.com, ,b.example.com".to_string()),
            ("DOMAIN_SHOP".to_string(), "shop.example.com".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);

        assert_eq!(config.spec.paths.state_file(), PathBuf::from("/tmp/tb/state.json"));
        assert_eq!(config.spec.paths.routing_file, PathBuf::from("/tmp/tb/domains.yml"));
        assert_eq!(config.spec.api.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.seed_hosts(),
            vec![
                "a.example.com".to_string(),
                "b.example.com".to_string(),
                "shop.example.com".to_string()
            ]
        );
    }

    #[test]
    fn test_validation() {
        let mut config = ControlPlaneConfig::default();
        assert!(config.validate().is_ok());

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.kind = "WrongKind".to_string();
        assert!(config.validate().is_err());
        config.kind = KIND.to_string();

        config.spec.api.port = 0;
        assert!(config.validate().is_err());
        config.spec.api.port = 9000;

        config.spec.routing.service_ports.insert("broken", 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_env_indirection() {
        let generation = GenerationConfig {
            openai_api_key: Some("env:TWINBOSS_TEST_UNSET_KEY_VAR".to_string()),
            ..Default::default()
        };
        assert_eq!(generation.resolved_api_key(), None);

        let literal = GenerationConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert_eq!(literal.resolved_api_key().as_deref(), Some("sk-test"));
    }
}
