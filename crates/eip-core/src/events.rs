//! Events emitted by the address service
//!
//! Events are informational. They go out over a bounded channel with
//! `try_send`; when nobody drains the channel fast enough, events are dropped
//! and a warning is logged. Provisioning never waits on a consumer.

use std::net::IpAddr;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::LivenessStatus;

/// Repair applied to a drifted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftRepair {
    /// Association cleared; the fresh probe result was stored
    Disassociated {
        /// Probed status
        status: LivenessStatus,
    },
    /// Record removed because the controller object is gone
    Deleted,
}

/// Events emitted by the address service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressEvent {
    /// Address allocated
    Allocated {
        /// Allocation id (`None` for legacy addresses)
        allocation_id: Option<String>,
        public_ip: IpAddr,
    },

    /// Address associated
    Associated {
        /// Association id (`None` for legacy addresses)
        association_id: Option<String>,
        public_ip: Option<IpAddr>,
    },

    /// Address disassociated
    Disassociated {
        association_id: Option<String>,
        status: Option<LivenessStatus>,
    },

    /// Address released
    Released {
        allocation_id: Option<String>,
        public_ip: Option<IpAddr>,
    },

    /// Reconciliation changed a stored status
    StatusChanged {
        allocation_id: String,
        previous: Option<LivenessStatus>,
        current: Option<LivenessStatus>,
    },

    /// A record diverged from the controller and was repaired
    DriftRepaired {
        allocation_id: String,
        external_id: String,
        repair: DriftRepair,
    },

    /// A provisioning scope unwound
    CompensationRan {
        operation: &'static str,
        executed: usize,
        failed: usize,
    },
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AddressEvent>,
}

impl EventSink {
    /// Create a sink and its receiver
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AddressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an event without waiting
    pub fn emit(&self, event: AddressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping event: {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!("Event receiver gone, dropping event: {:?}", event);
            }
        }
    }
}
