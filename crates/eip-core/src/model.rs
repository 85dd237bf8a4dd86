// # Domain Model
//
// Local address records, read-only controller snapshots and the formatted
// description returned to callers.
//
// ## Record Field Presence
//
// An `AddressRecord` can only be in one of these shapes:
//
// | association | status    | meaning                                         |
// |-------------|-----------|-------------------------------------------------|
// | absent      | absent    | allocated, idle                                 |
// | present     | present   | associated, last probe recorded                 |
// | present     | absent    | associated before status tracking existed       |
// | absent      | present   | disassociated, routing not yet confirmed gone   |
//
// The association itself is a single optional pair, so a record with an
// interface id but no private address (or the reverse) cannot be built.
// Persisted documents are checked on load and on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ids;
use crate::{Error, Result};

/// Last probed routing state of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStatus {
    /// Forwarding state confirms the address is routed
    Active,
    /// Not (yet) confirmed
    Pending,
}

impl LivenessStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessStatus::Active => "active",
            LivenessStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Overlay address with a local record
    Vpc,
    /// Legacy flat-network address
    Standard,
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vpc" => Ok(Domain::Vpc),
            "standard" => Ok(Domain::Standard),
            other => Err(Error::invalid_value(format!(
                "Invalid value '{}' for domain.",
                other
            ))),
        }
    }
}

/// Binding of an address to an attachment point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Attachment point (network interface) id
    pub network_interface_id: String,
    /// Private address the public address forwards to
    pub private_ip_address: IpAddr,
}

/// Field-presence shape of a record (see module docs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// No association, no status
    Idle,
    /// Associated; status is `None` for records predating status tracking
    Associated(Option<LivenessStatus>),
    /// Association cleared while the last probe is still recorded
    Draining(LivenessStatus),
}

/// Local metadata for an allocated overlay address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AddressDocument", into = "AddressDocument")]
pub struct AddressRecord {
    /// Local allocation id (`eipalloc-...`)
    pub id: String,
    /// Identity of the address object in the controller
    pub external_id: String,
    /// The allocated public address
    pub public_ip: IpAddr,
    /// Current association, if any
    pub association: Option<Association>,
    /// Last probed liveness, if uncertain
    pub status: Option<LivenessStatus>,
    /// Allocation time
    pub allocated_at: DateTime<Utc>,
}

impl AddressRecord {
    /// Create an idle record for a freshly allocated address
    pub fn new(id: impl Into<String>, external_id: impl Into<String>, public_ip: IpAddr) -> Self {
        Self {
            id: id.into(),
            external_id: external_id.into(),
            public_ip,
            association: None,
            status: None,
            allocated_at: Utc::now(),
        }
    }

    /// Field-presence shape of this record
    pub fn shape(&self) -> RecordShape {
        match (&self.association, self.status) {
            (Some(_), status) => RecordShape::Associated(status),
            (None, Some(status)) => RecordShape::Draining(status),
            (None, None) => RecordShape::Idle,
        }
    }

    /// Whether the record is bound to an attachment point
    pub fn is_associated(&self) -> bool {
        self.association.is_some()
    }

    /// Bound attachment point id, if any
    pub fn network_interface_id(&self) -> Option<&str> {
        self.association
            .as_ref()
            .map(|a| a.network_interface_id.as_str())
    }

    /// Association id derived from the allocation id
    pub fn association_id(&self) -> String {
        ids::association_id(&self.id)
    }

    /// Check the record before it is persisted
    pub fn validate(&self) -> Result<()> {
        if ids::kind_of(&self.id) != Some(ids::ALLOCATION_KIND) {
            return Err(Error::store(format!(
                "Record id '{}' is not an allocation id",
                self.id
            )));
        }
        if self.external_id.is_empty() {
            return Err(Error::store(format!(
                "Record {} has an empty external id",
                self.id
            )));
        }
        if let Some(association) = &self.association {
            if association.network_interface_id.is_empty() {
                return Err(Error::store(format!(
                    "Record {} is associated with an empty interface id",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Persisted document form of [`AddressRecord`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AddressDocument {
    id: String,
    external_id: String,
    public_ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network_interface_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_ip_address: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<LivenessStatus>,
    allocated_at: DateTime<Utc>,
}

impl TryFrom<AddressDocument> for AddressRecord {
    type Error = Error;

    fn try_from(doc: AddressDocument) -> Result<Self> {
        let association = match (doc.network_interface_id, doc.private_ip_address) {
            (Some(network_interface_id), Some(private_ip_address)) => Some(Association {
                network_interface_id,
                private_ip_address,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::store(format!(
                    "Record {} has a partial association",
                    doc.id
                )));
            }
        };

        let record = AddressRecord {
            id: doc.id,
            external_id: doc.external_id,
            public_ip: doc.public_ip,
            association,
            status: doc.status,
            allocated_at: doc.allocated_at,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<AddressRecord> for AddressDocument {
    fn from(record: AddressRecord) -> Self {
        let (network_interface_id, private_ip_address) = match record.association {
            Some(a) => (Some(a.network_interface_id), Some(a.private_ip_address)),
            None => (None, None),
        };
        Self {
            id: record.id,
            external_id: record.external_id,
            public_ip: record.public_ip,
            network_interface_id,
            private_ip_address,
            status: record.status,
            allocated_at: record.allocated_at,
        }
    }
}

/// Read-only snapshot of an address as the controller sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalAddressView {
    /// Controller identity
    pub external_id: String,
    /// The address value
    pub address: IpAddr,
    /// Bound port, if any
    pub port_id: Option<String>,
    /// Bound private address, if any
    pub fixed_ip_address: Option<IpAddr>,
    /// Compute instance the address is bound to (legacy API only)
    pub instance_id: Option<String>,
}

impl ExternalAddressView {
    /// Whether the controller binding matches a local association
    pub fn matches(&self, association: &Association) -> bool {
        self.port_id.is_some() && self.fixed_ip_address == Some(association.private_ip_address)
    }
}

/// Port as listed by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPort {
    /// Port id
    pub id: String,
    /// Device (compute instance) owning the port
    pub device_id: Option<String>,
    /// First fixed address of the port
    pub fixed_ip_address: Option<IpAddr>,
}

/// Parameters for creating an external address object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAddressSpec {
    /// External network the address is taken from
    pub floating_network_id: String,
    /// Owner (project) of the address
    pub owner: String,
}

/// Virtual network interface an address can be bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPoint {
    /// Attachment point id
    pub id: String,
    /// Controller port backing the attachment point
    pub external_port_id: String,
    /// Instance owning the attachment point
    pub instance_id: Option<String>,
    /// Primary private address
    pub private_ip_address: IpAddr,
}

/// Address as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDescription {
    /// Public address
    pub public_ip: IpAddr,
    /// `vpc` for overlay records, `standard` otherwise
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_interface_owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LivenessStatus>,
}
