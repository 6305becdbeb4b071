//! Platform configuration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{PlatformError, PlatformResult};

/// Default location of the platform config, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "integration-tests/platform.toml";

/// Platform configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Phase timeouts
    pub timeouts: PlatformTimeouts,

    /// Container network to attach every container to
    pub network: Option<String>,

    /// Containers making up the platform, started in order
    pub containers: Vec<ContainerSpec>,

    /// End-to-end test container (absent = platform-only mode)
    pub e2e: Option<E2eSpec>,
}

impl PlatformConfig {
    /// Load a config file. `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> PlatformResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PlatformConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => toml::from_str(&raw)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PlatformResult<()> {
        if self.containers.is_empty() {
            return Err(PlatformError::InvalidConfig(
                "at least one container must be defined".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for container in &self.containers {
            if container.name.trim().is_empty() {
                return Err(PlatformError::InvalidConfig("container name must not be empty".to_string()));
            }
            if container.image.trim().is_empty() {
                return Err(PlatformError::InvalidConfig(format!(
                    "container {} has no image",
                    container.name
                )));
            }
            if !seen.insert(container.name.as_str()) {
                return Err(PlatformError::InvalidConfig(format!(
                    "duplicate container name: {}",
                    container.name
                )));
            }
        }

        if let Some(e2e) = &self.e2e {
            if e2e.image.trim().is_empty() {
                return Err(PlatformError::InvalidConfig("e2e image must not be empty".to_string()));
            }
        }

        self.timeouts.validate()
    }
}

/// Phase timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformTimeouts {
    /// Budget for starting all containers
    pub startup_ms: u64,

    /// Budget for all health checks
    pub health_check_ms: u64,

    /// Budget for the E2E run, and the hold window in platform-only mode
    pub e2e_ms: u64,
}

impl PlatformTimeouts {
    pub fn startup(&self) -> Duration {
        Duration::from_millis(self.startup_ms)
    }

    pub fn health_check(&self) -> Duration {
        Duration::from_millis(self.health_check_ms)
    }

    pub fn e2e(&self) -> Duration {
        Duration::from_millis(self.e2e_ms)
    }

    fn validate(&self) -> PlatformResult<()> {
        for (name, value) in [
            ("startup_ms", self.startup_ms),
            ("health_check_ms", self.health_check_ms),
            ("e2e_ms", self.e2e_ms),
        ] {
            if value == 0 {
                return Err(PlatformError::InvalidConfig(format!("timeouts.{} must be > 0", name)));
            }
        }
        Ok(())
    }
}

impl Default for PlatformTimeouts {
    fn default() -> Self {
        Self {
            startup_ms: 300_000,
            health_check_ms: 120_000,
            e2e_ms: 600_000,
        }
    }
}

/// A single platform container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Logical name, unique within the platform
    pub name: String,

    /// Image reference (e.g., "postgres:16")
    pub image: String,

    /// Environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Port mappings in runtime syntax ("8080:8080")
    #[serde(default)]
    pub ports: Vec<String>,

    /// Command override
    #[serde(default)]
    pub command: Vec<String>,

    /// Health check (None = running state is enough)
    #[serde(default)]
    pub health: Option<HealthCheck>,
}

/// HTTP health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// URL that must answer with a 2xx status
    pub url: String,

    /// Delay between attempts
    #[serde(default = "default_health_interval")]
    pub interval_ms: u64,
}

fn default_health_interval() -> u64 {
    500
}

/// End-to-end test container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct E2eSpec {
    pub image: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Mount point of the run's `results-e2e/` inside the container
    #[serde(default = "default_results_path")]
    pub results_path: String,
}

fn default_results_path() -> String {
    "/reports".to_string()
}
