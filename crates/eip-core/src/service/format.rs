//! Caller-facing address descriptions

use crate::model::{AddressDescription, AddressRecord, Domain, ExternalAddressView, ExternalPort};

/// Describe one controller address, with its local record if it has one
///
/// Addresses without a record are `standard`. The instance comes from the
/// device of the bound port, or from the legacy binding when there is no
/// port.
pub fn format_address(
    record: Option<&AddressRecord>,
    view: &ExternalAddressView,
    ports: &[ExternalPort],
    owner: &str,
) -> AddressDescription {
    let instance_id = match &view.port_id {
        Some(port_id) => ports
            .iter()
            .find(|p| &p.id == port_id)
            .and_then(|p| p.device_id.clone())
            .filter(|d| !d.is_empty()),
        None => view.instance_id.clone(),
    };

    let mut description = AddressDescription {
        public_ip: view.address,
        domain: Domain::Standard,
        allocation_id: None,
        association_id: None,
        network_interface_id: None,
        network_interface_owner_id: None,
        private_ip_address: view.fixed_ip_address,
        instance_id,
        status: None,
    };

    let Some(record) = record else {
        return description;
    };

    description.domain = Domain::Vpc;
    description.allocation_id = Some(record.id.clone());
    if let Some(association) = &record.association {
        description.association_id = Some(record.association_id());
        description.network_interface_id = Some(association.network_interface_id.clone());
        description.network_interface_owner_id = Some(owner.to_string());
        description.status = record.status;
    } else if record.status.is_some() {
        // Still draining: the association id stays visible with its status
        description.association_id = Some(record.association_id());
        description.status = record.status;
    }
    description
}
