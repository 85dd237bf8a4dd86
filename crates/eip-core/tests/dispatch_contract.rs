//! Contract Test: Backend dispatch
//!
//! The deployment mode picks one backend for all calls. Legacy deployments
//! never touch the overlay controller or the store; overlay deployments
//! hand bare addresses they do not own to the legacy API.
//!
//! Constraints verified:
//! - Legacy mode answers every call without local records
//! - Id-based calls are refused in legacy mode
//! - The registry assembles a working service from configuration

mod common;

use common::*;
use eip_core::backend::BackendParts;
use eip_core::config::{BackendKind, ProbeConfig, StoreConfig};
use eip_core::model::{Domain, LivenessStatus};
use eip_core::service::{
    AssociateRequest, DescribeRequest, DisassociateRequest, ReleaseRequest,
};
use eip_core::traits::{
    LegacyComputeClient, LegacyComputeFactory, NetworkController, NetworkControllerFactory,
};
use eip_core::{AddressService, ComponentRegistry, ControllerConfig, Error, Result};
use std::sync::Arc;

// ============================================================================
// Legacy mode
// ============================================================================

#[tokio::test]
async fn legacy_lifecycle() {
    let h = Harness::new(BackendKind::Legacy);
    assert_eq!(h.service.backend_kind(), BackendKind::Legacy);

    let described = h.service.allocate_address(Some("vpc")).await.unwrap();
    assert_eq!(described.domain, Domain::Standard);
    let public_ip = described.public_ip;

    let outcome = h
        .service
        .associate_address(&AssociateRequest {
            public_ip: Some(public_ip),
            instance_id: Some("vm-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.association_id, None);
    assert_eq!(outcome.status, None);
    assert_eq!(h.legacy.instance_of(public_ip).as_deref(), Some("vm-1"));

    let listed = h
        .service
        .describe_addresses(&DescribeRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].instance_id.as_deref(), Some("vm-1"));
    assert_eq!(listed[0].domain, Domain::Standard);

    let status = h
        .service
        .disassociate_address(&DisassociateRequest {
            public_ip: Some(public_ip),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(status, None);
    assert_eq!(h.legacy.instance_of(public_ip), None);

    h.service
        .release_address(&ReleaseRequest {
            public_ip: Some(public_ip),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(h.legacy.count(), 0);

    assert_eq!(h.controller.mutating_calls(), 0);
    assert_eq!(h.store.touched(), 1, "describe lists the empty store once");
}

#[tokio::test]
async fn legacy_mode_refuses_ids() {
    let h = Harness::new(BackendKind::Legacy);

    let associate = h
        .service
        .associate_address(&AssociateRequest {
            allocation_id: Some("eipalloc-00000001".into()),
            instance_id: Some("vm-1".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(associate, Error::AllocationNotFound(_)));

    let disassociate = h
        .service
        .disassociate_address(&DisassociateRequest {
            association_id: Some("eipassoc-00000001".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(disassociate, Error::AssociationNotFound(_)));

    let release = h
        .service
        .release_address(&ReleaseRequest {
            allocation_id: Some("eipalloc-00000001".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(release, Error::AllocationNotFound(_)));
    assert_eq!(h.legacy.calls(), 0);
}

#[tokio::test]
async fn legacy_mode_rejects_interface_targets() {
    let h = Harness::new(BackendKind::Legacy);
    let public_ip = h.service.allocate_address(None).await.unwrap().public_ip;

    let err = h
        .service
        .associate_address(&AssociateRequest {
            public_ip: Some(public_ip),
            network_interface_id: Some("port-1".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidParameterCombination(_)));
}

#[tokio::test]
async fn unknown_bare_address_is_not_owned() {
    let h = Harness::new(BackendKind::Legacy);

    let err = h
        .service
        .release_address(&ReleaseRequest {
            public_ip: Some(ip("198.51.100.200")),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AddressNotOwned(_)));
}

#[tokio::test]
async fn legacy_quota_maps_to_address_limit() {
    let h = Harness::new(BackendKind::Legacy);
    h.legacy
        .quota_exhausted
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.service.allocate_address(None).await.unwrap_err();

    assert!(matches!(err, Error::AddressLimitExceeded));
}

// ============================================================================
// Overlay delegation
// ============================================================================

#[tokio::test]
async fn overlay_delegates_unowned_bare_address() {
    let h = Harness::overlay();
    let public_ip = h.service.allocate_address(None).await.unwrap().public_ip;

    h.service
        .associate_address(&AssociateRequest {
            public_ip: Some(public_ip),
            instance_id: Some("vm-flat".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(h.legacy.instance_of(public_ip).as_deref(), Some("vm-flat"));

    h.service
        .disassociate_address(&DisassociateRequest {
            public_ip: Some(public_ip),
            ..Default::default()
        })
        .await
        .unwrap();
    h.service
        .release_address(&ReleaseRequest {
            public_ip: Some(public_ip),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(h.legacy.count(), 0);
    assert_eq!(h.controller.mutating_calls(), 0);
}

#[tokio::test]
async fn overlay_without_controller_is_a_config_error() {
    let parts = BackendParts {
        controller: None,
        legacy: Arc::new(FakeLegacy::new()),
        resolver: None,
        store: Arc::new(FlakyStore::new()),
        probe: Arc::new(ScriptedProbe::new(LivenessStatus::Pending)),
    };

    let result = AddressService::new(parts, &config(BackendKind::Overlay));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn invalid_service_config_is_rejected() {
    let parts = BackendParts {
        controller: None,
        legacy: Arc::new(FakeLegacy::new()),
        resolver: None,
        store: Arc::new(FlakyStore::new()),
        probe: Arc::new(ScriptedProbe::new(LivenessStatus::Pending)),
    };
    let mut config = config(BackendKind::Overlay);
    config.service.public_network_id.clear();

    let result = AddressService::new(parts, &config);

    assert!(matches!(result, Err(Error::Config(ref m)) if m.contains("Public network")));
}

// ============================================================================
// Registry assembly
// ============================================================================

struct FakeControllerFactory(Arc<FakeController>);

impl NetworkControllerFactory for FakeControllerFactory {
    fn create(&self, _config: &ControllerConfig) -> Result<Arc<dyn NetworkController>> {
        Ok(self.0.clone() as Arc<dyn NetworkController>)
    }
}

struct FakeLegacyFactory(Arc<FakeLegacy>);

impl LegacyComputeFactory for FakeLegacyFactory {
    fn create(&self, _config: &ControllerConfig) -> Result<Arc<dyn LegacyComputeClient>> {
        Ok(self.0.clone() as Arc<dyn LegacyComputeClient>)
    }
}

#[tokio::test]
async fn registry_builds_overlay_service() {
    let controller = Arc::new(FakeController::new());
    let legacy = Arc::new(FakeLegacy::new());
    let registry = ComponentRegistry::with_builtins();
    registry.register_controller("fake", Box::new(FakeControllerFactory(controller.clone())));
    registry.register_legacy_client("fake", Box::new(FakeLegacyFactory(legacy.clone())));

    let mut config = config(BackendKind::Overlay);
    config.probe = ProbeConfig::Static {
        status: LivenessStatus::Active,
    };
    let parts = registry.build_parts(&config).await.unwrap();
    let (service, _events) = AddressService::new(parts, &config).unwrap();

    let allocation_id = service
        .allocate_address(Some("vpc"))
        .await
        .unwrap()
        .allocation_id
        .unwrap();
    assert_eq!(controller.address_count(), 1);

    let listed = service
        .describe_addresses(&DescribeRequest {
            allocation_ids: vec![allocation_id],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].domain, Domain::Vpc);
}

#[tokio::test]
async fn registry_builds_file_backed_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("addresses.json");
    let controller = Arc::new(FakeController::new());
    let registry = ComponentRegistry::with_builtins();
    registry.register_controller("fake", Box::new(FakeControllerFactory(controller.clone())));
    registry.register_legacy_client("fake", Box::new(FakeLegacyFactory(Arc::new(FakeLegacy::new()))));

    let mut config = config(BackendKind::Overlay);
    config.store = StoreConfig::File {
        path: path.to_string_lossy().into_owned(),
    };

    let allocation_id = {
        let parts = registry.build_parts(&config).await.unwrap();
        let (service, _events) = AddressService::new(parts, &config).unwrap();
        service
            .allocate_address(Some("vpc"))
            .await
            .unwrap()
            .allocation_id
            .unwrap()
    };

    // A new service over the same file sees the record
    let parts = registry.build_parts(&config).await.unwrap();
    let (service, _events) = AddressService::new(parts, &config).unwrap();
    service
        .release_address(&ReleaseRequest {
            allocation_id: Some(allocation_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(controller.address_count(), 0);
}

#[tokio::test]
async fn registry_reports_unknown_controller() {
    let registry = ComponentRegistry::with_builtins();
    registry.register_legacy_client("fake", Box::new(FakeLegacyFactory(Arc::new(FakeLegacy::new()))));

    let result = registry.build_parts(&config(BackendKind::Overlay)).await;

    assert!(matches!(result, Err(Error::Config(ref m)) if m.contains("fake")));

    // Legacy deployments never build a controller
    assert!(registry.build_parts(&config(BackendKind::Legacy)).await.is_ok());
}
