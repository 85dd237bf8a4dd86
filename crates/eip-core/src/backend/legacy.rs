//! Legacy flat-network backend
//!
//! Addresses belong to the account and attach straight to compute
//! instances. Nothing is recorded locally, so there is nothing to compensate
//! and no allocation or association id to hand out.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::info;

use super::{
    quota_to_limit, AddressBackend, AddressRef, Allocation, AttachmentTarget, DisassociateRef,
};
use crate::config::BackendKind;
use crate::model::{Domain, ExternalAddressView, ExternalPort, LivenessStatus};
use crate::traits::LegacyComputeClient;
use crate::{Error, Result};

/// Backend over the legacy compute API
pub struct LegacyBackend {
    client: Arc<dyn LegacyComputeClient>,
}

impl LegacyBackend {
    /// Create a legacy backend
    pub fn new(client: Arc<dyn LegacyComputeClient>) -> Self {
        Self { client }
    }

    /// Find an account address by value
    async fn find(&self, public_ip: IpAddr) -> Result<ExternalAddressView> {
        self.client
            .list_floating_ips()
            .await?
            .into_iter()
            .find(|ip| ip.address == public_ip)
            .ok_or_else(|| Error::AddressNotOwned(public_ip.to_string()))
    }
}

#[async_trait]
impl AddressBackend for LegacyBackend {
    async fn allocate(&self, _domain: Option<Domain>) -> Result<Allocation> {
        let external = self
            .client
            .create_floating_ip()
            .await
            .map_err(quota_to_limit)?;
        info!(
            "Allocated standard address {} via {}",
            external.address,
            self.client.client_name()
        );
        Ok(Allocation {
            record: None,
            external,
        })
    }

    async fn associate(
        &self,
        address: &AddressRef,
        target: &AttachmentTarget,
        private_ip_address: Option<IpAddr>,
    ) -> Result<Option<String>> {
        let public_ip = match address {
            AddressRef::PublicIp(ip) => *ip,
            AddressRef::Allocation(id) => return Err(Error::allocation_not_found(id)),
        };
        if target.network_interface_id.is_some() || private_ip_address.is_some() {
            return Err(Error::invalid_combination(
                "Network interface and private IP address cannot be used with standard addresses",
            ));
        }
        let instance_id = target.instance_id.as_deref().ok_or_else(|| {
            Error::missing_parameter("Instance ID is required to associate a standard address")
        })?;

        // Unknown addresses are rejected before touching the instance
        self.find(public_ip).await?;
        self.client.add_floating_ip(instance_id, public_ip).await?;
        info!("Associated standard address {} with {}", public_ip, instance_id);
        Ok(None)
    }

    async fn disassociate(&self, address: &DisassociateRef) -> Result<Option<LivenessStatus>> {
        let public_ip = match address {
            DisassociateRef::PublicIp(ip) => *ip,
            DisassociateRef::Association(id) => return Err(Error::association_not_found(id)),
        };

        let view = self.find(public_ip).await?;
        if let Some(instance_id) = view.instance_id {
            self.client.remove_floating_ip(&instance_id, public_ip).await?;
            info!(
                "Disassociated standard address {} from {}",
                public_ip, instance_id
            );
        }
        Ok(None)
    }

    async fn release(&self, address: &AddressRef) -> Result<()> {
        let public_ip = match address {
            AddressRef::PublicIp(ip) => *ip,
            AddressRef::Allocation(id) => return Err(Error::allocation_not_found(id)),
        };

        let view = self.find(public_ip).await?;
        self.client.delete_floating_ip(&view.external_id).await?;
        info!("Released standard address {}", public_ip);
        Ok(())
    }

    async fn external_addresses(&self) -> Result<Vec<ExternalAddressView>> {
        self.client.list_floating_ips().await
    }

    async fn external_ports(&self) -> Result<Vec<ExternalPort>> {
        Ok(Vec::new())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Legacy
    }
}
