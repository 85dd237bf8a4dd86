//! Configuration types for the elastic address system
//!
//! Configuration is resolved once at startup into an [`EipConfig`] value and
//! handed to constructors; nothing reads it ambiently at call time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::LivenessStatus;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EipConfig {
    /// Which backend strategy serves provisioning calls
    #[serde(default)]
    pub backend: BackendKind,

    /// External controller configuration
    pub controller: ControllerConfig,

    /// Liveness probe configuration
    pub probe: ProbeConfig,

    /// Address store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Service settings
    pub service: ServiceConfig,
}

impl EipConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.controller.validate()?;
        self.probe.validate()?;
        self.store.validate()?;
        self.service.validate(self.backend)?;
        Ok(())
    }
}

/// Backend strategy, selected once per deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Overlay network with independent address objects
    #[default]
    Overlay,
    /// Legacy flat network, addresses bound to instances
    Legacy,
}

impl BackendKind {
    /// Configuration name of the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Overlay => "overlay",
            BackendKind::Legacy => "legacy",
        }
    }
}

/// External controller configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerConfig {
    /// OpenStack Neutron (overlay) + Nova (legacy)
    Openstack {
        /// Networking API endpoint (e.g. `https://neutron.example:9696`)
        network_endpoint: String,
        /// Compute API endpoint (e.g. `https://nova.example:8774/v2.1`)
        compute_endpoint: String,
        /// Pre-issued auth token
        auth_token: String,
    },

    /// Custom controller
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ControllerConfig {
    /// Validate the controller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ControllerConfig::Openstack {
                network_endpoint,
                compute_endpoint,
                auth_token,
            } => {
                for (name, endpoint) in [
                    ("network", network_endpoint),
                    ("compute", compute_endpoint),
                ] {
                    if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                        return Err(crate::Error::config(format!(
                            "OpenStack {} endpoint must be an HTTP(S) URL",
                            name
                        )));
                    }
                }
                if auth_token.is_empty() {
                    return Err(crate::Error::config("OpenStack auth token cannot be empty"));
                }
                Ok(())
            }
            ControllerConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom controller factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom controller config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the controller type name
    pub fn type_name(&self) -> &str {
        match self {
            ControllerConfig::Openstack { .. } => "openstack",
            ControllerConfig::Custom { factory, .. } => factory,
        }
    }
}

// Keeps the auth token out of logs
impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerConfig::Openstack {
                network_endpoint,
                compute_endpoint,
                ..
            } => f
                .debug_struct("Openstack")
                .field("network_endpoint", network_endpoint)
                .field("compute_endpoint", compute_endpoint)
                .field("auth_token", &"<REDACTED>")
                .finish(),
            ControllerConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Liveness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Routing looking glass reachable over HTTP
    Http {
        /// Base URL of the looking glass
        url: String,
        /// Request timeout in seconds
        #[serde(default = "default_probe_timeout_secs")]
        timeout_secs: u64,
    },

    /// Always answer with the same status
    Static {
        /// Status to report
        status: LivenessStatus,
    },

    /// Custom probe
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProbeConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP probe URL cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP probe timeout must be > 0"));
                }
                Ok(())
            }
            ProbeConfig::Static { .. } => Ok(()),
            ProbeConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom probe factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the probe type name
    pub fn type_name(&self) -> &str {
        match self {
            ProbeConfig::Http { .. } => "http",
            ProbeConfig::Static { .. } => "static",
            ProbeConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Address store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Store file path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Project owning the addresses
    pub project_id: String,

    /// External network overlay addresses are allocated from
    #[serde(default)]
    pub public_network_id: String,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Interval between reconciliation sweeps run by the daemon
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

impl ServiceConfig {
    /// Create service settings with defaults
    pub fn new(project_id: impl Into<String>, public_network_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            public_network_id: public_network_id.into(),
            event_channel_capacity: default_event_channel_capacity(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }

    /// Validate the service settings
    pub fn validate(&self, backend: BackendKind) -> Result<(), crate::Error> {
        if self.project_id.is_empty() {
            return Err(crate::Error::config("Project id cannot be empty"));
        }
        if backend == BackendKind::Overlay && self.public_network_id.is_empty() {
            return Err(crate::Error::config(
                "Public network id is required by the overlay backend",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(crate::Error::config("Reconcile interval must be > 0"));
        }
        Ok(())
    }
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_reconcile_interval_secs() -> u64 {
    60
}
