// # eip-core
//
// Core library for elastic address provisioning and drift reconciliation.
//
// ## Architecture Overview
//
// - **NetworkController / LegacyComputeClient**: the external control planes
// - **LivenessProbe**: routing state of a public address
// - **AddressStore**: local records, with soft delete for compensation
// - **CrashCleaner**: compensation scope around multi-step operations
// - **AddressBackend**: overlay and legacy strategies for the same protocol
// - **Reconciler**: repairs local records against controller state
// - **AddressService**: validated entry points and event emission
// - **ComponentRegistry**: factories keyed by configuration type name
//
// ## Design Principles
//
// 1. **Controller first**: a local record never exists without its
//    controller object, and is removed only after the object is gone
// 2. **Compensate, don't lock**: partial failures are undone in reverse
//    order; no lock spans two external calls
// 3. **Probe is authoritative**: stored status is only ever a probe result
// 4. **Plugin-based**: controllers, probes and stores come from factories

pub mod attachment;
pub mod backend;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod probe;
pub mod reconcile;
pub mod records;
pub mod registry;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use backend::{AddressBackend, BackendParts};
pub use cleanup::CrashCleaner;
pub use config::{BackendKind, ControllerConfig, EipConfig, ProbeConfig, ServiceConfig, StoreConfig};
pub use error::{Error, ErrorKind, Result};
pub use events::{AddressEvent, DriftRepair};
pub use model::{AddressDescription, AddressRecord, LivenessStatus};
pub use registry::ComponentRegistry;
pub use service::AddressService;
pub use store::{FileAddressStore, MemoryAddressStore};
pub use traits::{AddressStore, LegacyComputeClient, LivenessProbe, NetworkController};
