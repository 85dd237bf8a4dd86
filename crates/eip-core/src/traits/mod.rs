//! Core traits for the elastic address system
//!
//! This module defines the abstract interfaces of the external collaborators.
//!
//! - [`NetworkController`]: overlay address objects and ports
//! - [`LegacyComputeClient`]: flat-network addresses bound to instances
//! - [`LivenessProbe`]: routing liveness of a public address
//! - [`AddressStore`]: local address records
//! - [`AttachmentPointResolver`]: network interfaces of instances

pub mod address_store;
pub mod attachment;
pub mod controller;
pub mod probe;

pub use address_store::{AddressStore, AddressStoreFactory};
pub use attachment::AttachmentPointResolver;
pub use controller::{
    LegacyComputeClient, LegacyComputeFactory, NetworkController, NetworkControllerFactory,
};
pub use probe::{LivenessProbe, LivenessProbeFactory};
