// # eipd - elastic address reconciliation daemon
//
// Thin integration layer: reads configuration from the environment, builds
// the components through the registry and runs a reconciliation sweep
// (describe over every address) on a fixed interval until SIGTERM/SIGINT.
// All address logic lives in eip-core.
//
// ## Configuration
//
// ### Deployment
// - `EIP_BACKEND`: `overlay` (default) or `legacy`
// - `EIP_PROJECT_ID`: project owning the addresses (required)
// - `EIP_PUBLIC_NETWORK_ID`: external network for overlay addresses
//
// ### Controller
// - `EIP_CONTROLLER_TYPE`: `openstack` (default) or a registered custom name
// - `EIP_NETWORK_ENDPOINT`: Neutron endpoint
// - `EIP_COMPUTE_ENDPOINT`: Nova endpoint, including the API version
// - `EIP_AUTH_TOKEN`: pre-issued Keystone token
//
// ### Liveness probe
// - `EIP_PROBE_TYPE`: `http` (default) or `static`
// - `EIP_PROBE_URL`: looking glass base URL (for http)
// - `EIP_PROBE_TIMEOUT_SECS`: request timeout (default 10)
// - `EIP_PROBE_STATUS`: reported status for the static probe (default pending)
//
// ### Store
// - `EIP_STORE_TYPE`: `file` (default) or `memory`
// - `EIP_STORE_PATH`: path of the JSON store (for file)
//
// ### Daemon
// - `EIP_RECONCILE_INTERVAL_SECS`: sweep interval (default 60)
// - `EIP_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export EIP_PROJECT_ID=0c3a6b1e9d4f4e2b8a7c5d3e1f0a9b8c
// export EIP_PUBLIC_NETWORK_ID=376da547-b977-4cfe-9cba-275c80debf57
// export EIP_NETWORK_ENDPOINT=https://neutron.example:9696
// export EIP_COMPUTE_ENDPOINT=https://nova.example:8774/v2.1
// export EIP_AUTH_TOKEN=...
// export EIP_PROBE_URL=http://lg.example:8080
// export EIP_STORE_PATH=/var/lib/eip/addresses.json
//
// eipd
// ```

use anyhow::{Context, Result};
use eip_core::config::{
    BackendKind, ControllerConfig, EipConfig, ProbeConfig, ServiceConfig, StoreConfig,
};
use eip_core::model::LivenessStatus;
use eip_core::service::DescribeRequest;
use eip_core::{AddressEvent, AddressService, ComponentRegistry};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes, following systemd conventions
#[derive(Debug, Clone, Copy)]
enum EipExitCode {
    /// Clean shutdown
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<EipExitCode> for ExitCode {
    fn from(code: EipExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Raw settings as read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    backend: String,
    controller_type: String,
    network_endpoint: Option<String>,
    compute_endpoint: Option<String>,
    auth_token: Option<String>,
    project_id: Option<String>,
    public_network_id: Option<String>,
    probe_type: String,
    probe_url: Option<String>,
    probe_timeout_secs: Option<String>,
    probe_status: Option<String>,
    store_type: String,
    store_path: Option<String>,
    reconcile_interval_secs: Option<String>,
    log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through a variable lookup
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        Self {
            backend: or("EIP_BACKEND", "overlay"),
            controller_type: or("EIP_CONTROLLER_TYPE", "openstack"),
            network_endpoint: get("EIP_NETWORK_ENDPOINT"),
            compute_endpoint: get("EIP_COMPUTE_ENDPOINT"),
            auth_token: get("EIP_AUTH_TOKEN"),
            project_id: get("EIP_PROJECT_ID"),
            public_network_id: get("EIP_PUBLIC_NETWORK_ID"),
            probe_type: or("EIP_PROBE_TYPE", "http"),
            probe_url: get("EIP_PROBE_URL"),
            probe_timeout_secs: get("EIP_PROBE_TIMEOUT_SECS"),
            probe_status: get("EIP_PROBE_STATUS"),
            store_type: or("EIP_STORE_TYPE", "file"),
            store_path: get("EIP_STORE_PATH"),
            reconcile_interval_secs: get("EIP_RECONCILE_INTERVAL_SECS"),
            log_level: or("EIP_LOG_LEVEL", "info"),
        }
    }

    /// Log level, rejecting unknown names
    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!(
                "EIP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }

    /// Build and validate the service configuration
    fn to_config(&self) -> Result<EipConfig> {
        let backend = match self.backend.as_str() {
            "overlay" => BackendKind::Overlay,
            "legacy" => BackendKind::Legacy,
            other => anyhow::bail!(
                "EIP_BACKEND '{}' is not supported. Supported backends: overlay, legacy",
                other
            ),
        };

        let controller = match self.controller_type.as_str() {
            "openstack" => ControllerConfig::Openstack {
                network_endpoint: required(&self.network_endpoint, "EIP_NETWORK_ENDPOINT")?,
                compute_endpoint: required(&self.compute_endpoint, "EIP_COMPUTE_ENDPOINT")?,
                auth_token: required(&self.auth_token, "EIP_AUTH_TOKEN")?,
            },
            custom => ControllerConfig::Custom {
                factory: custom.to_string(),
                config: serde_json::json!({}),
            },
        };

        let probe = match self.probe_type.as_str() {
            "http" => ProbeConfig::Http {
                url: required(&self.probe_url, "EIP_PROBE_URL")?,
                timeout_secs: parse_or(&self.probe_timeout_secs, "EIP_PROBE_TIMEOUT_SECS", 10)?,
            },
            "static" => {
                let status = match self.probe_status.as_deref() {
                    None | Some("pending") => LivenessStatus::Pending,
                    Some("active") => LivenessStatus::Active,
                    Some(other) => anyhow::bail!(
                        "EIP_PROBE_STATUS '{}' is not valid. Valid statuses: pending, active",
                        other
                    ),
                };
                ProbeConfig::Static { status }
            }
            custom => ProbeConfig::Custom {
                factory: custom.to_string(),
                config: serde_json::json!({}),
            },
        };

        let store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: required(&self.store_path, "EIP_STORE_PATH")?,
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "EIP_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let mut service = ServiceConfig::new(
            required(&self.project_id, "EIP_PROJECT_ID")?,
            self.public_network_id.clone().unwrap_or_default(),
        );
        service.reconcile_interval_secs = parse_or(
            &self.reconcile_interval_secs,
            "EIP_RECONCILE_INTERVAL_SECS",
            service.reconcile_interval_secs,
        )?;

        let config = EipConfig {
            backend,
            controller,
            probe,
            store,
            service,
        };
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => anyhow::bail!("{} is required. Set it via: export {}=...", key, key),
    }
}

fn parse_or(value: &Option<String>, key: &str, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .with_context(|| format!("{} must be a number of seconds. Got: {}", key, v)),
    }
}

fn main() -> ExitCode {
    let settings = Settings::from_env();

    let log_level = match settings.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return EipExitCode::ConfigError.into();
        }
    };

    let config = match settings.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return EipExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return EipExitCode::ConfigError.into();
    }

    info!("Starting eipd ({} backend)", config.backend.as_str());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return EipExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => EipExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                EipExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: EipConfig) -> Result<()> {
    let registry = ComponentRegistry::with_builtins();

    #[cfg(feature = "openstack")]
    {
        info!("Registering OpenStack controllers");
        eip_controller_openstack::register(&registry);
    }

    #[cfg(feature = "http-probe")]
    {
        info!("Registering HTTP liveness probe");
        eip_probe_http::register(&registry);
    }

    let parts = registry
        .build_parts(&config)
        .await
        .context("Failed to create components")?;
    let (service, events) = AddressService::new(parts, &config)?;
    let event_logger = tokio::spawn(log_events(events));

    let interval = Duration::from_secs(config.service.reconcile_interval_secs);
    let mut ticks = IntervalStream::new(tokio::time::interval(interval));
    info!("Reconciling every {:?}", interval);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                let signal = signal?;
                info!("Received shutdown signal: {}", signal);
                break;
            }
            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }
                sweep(&service).await;
            }
        }
    }

    if let Err(e) = service.flush().await {
        warn!("Failed to flush address store: {}", e);
    }

    // Dropping the service closes the event channel
    drop(service);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    info!("Shutting down eipd");
    Ok(())
}

/// One reconciliation pass over every address
async fn sweep(service: &AddressService) {
    match service.describe_addresses(&DescribeRequest::default()).await {
        Ok(addresses) => info!("Reconciled {} address(es)", addresses.len()),
        Err(e) if e.is_retryable() => warn!("Reconciliation sweep deferred: {}", e),
        Err(e) => error!("Reconciliation sweep failed: {}", e),
    }
}

/// Log events until the channel closes
async fn log_events(mut events: mpsc::Receiver<AddressEvent>) {
    while let Some(event) = events.recv().await {
        match &event {
            AddressEvent::DriftRepaired { .. } => warn!("{:?}", event),
            AddressEvent::CompensationRan { failed, .. } if *failed > 0 => {
                error!("{:?}", event)
            }
            _ => info!("{:?}", event),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for CTRL-C
///
/// Fallback for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
