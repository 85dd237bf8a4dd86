//! Attachment points derived from controller ports
//!
//! Every port of the owner that carries a fixed address is an attachment
//! point. Its id is the port id and its instance is the port's device.

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{AttachmentPoint, ExternalPort};
use crate::traits::{AttachmentPointResolver, NetworkController};
use crate::{Error, Result};

/// Resolver backed by [`NetworkController::list_ports`]
pub struct PortAttachmentResolver {
    controller: Arc<dyn NetworkController>,
    owner: String,
}

impl PortAttachmentResolver {
    /// Create a resolver for one owner's ports
    pub fn new(controller: Arc<dyn NetworkController>, owner: impl Into<String>) -> Self {
        Self {
            controller,
            owner: owner.into(),
        }
    }

    async fn points(&self) -> Result<Vec<AttachmentPoint>> {
        let ports = self.controller.list_ports(&self.owner).await?;
        Ok(ports.into_iter().filter_map(to_point).collect())
    }
}

fn to_point(port: ExternalPort) -> Option<AttachmentPoint> {
    let private_ip_address = port.fixed_ip_address?;
    Some(AttachmentPoint {
        id: port.id.clone(),
        external_port_id: port.id,
        instance_id: port.device_id.filter(|d| !d.is_empty()),
        private_ip_address,
    })
}

#[async_trait]
impl AttachmentPointResolver for PortAttachmentResolver {
    async fn for_instance(&self, instance_id: &str) -> Result<Vec<AttachmentPoint>> {
        Ok(self
            .points()
            .await?
            .into_iter()
            .filter(|p| p.instance_id.as_deref() == Some(instance_id))
            .collect())
    }

    async fn get(&self, attachment_point_id: &str) -> Result<AttachmentPoint> {
        self.points()
            .await?
            .into_iter()
            .find(|p| p.id == attachment_point_id)
            .ok_or_else(|| {
                Error::not_found(format!("Network interface {}", attachment_point_id))
            })
    }
}
