//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their state in memory, count every call and can be told
//! to fail specific operations.

#![allow(dead_code)]

use async_trait::async_trait;
use eip_core::backend::BackendParts;
use eip_core::config::{BackendKind, ControllerConfig, EipConfig, ProbeConfig, ServiceConfig, StoreConfig};
use eip_core::error::{Error, Result};
use eip_core::model::{
    AddressRecord, CreateAddressSpec, ExternalAddressView, ExternalPort, LivenessStatus,
};
use eip_core::traits::{AddressStore, LegacyComputeClient, LivenessProbe, NetworkController};
use eip_core::{AddressEvent, AddressService, MemoryAddressStore};
use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const PROJECT: &str = "project-1";
pub const PUBLIC_NETWORK: &str = "public-net";

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// In-memory overlay controller
#[derive(Default)]
pub struct FakeController {
    addresses: Mutex<BTreeMap<String, ExternalAddressView>>,
    ports: Mutex<Vec<ExternalPort>>,
    next: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub bind_calls: AtomicUsize,
    pub unbind_calls: AtomicUsize,
    pub show_calls: AtomicUsize,
    pub list_port_calls: AtomicUsize,
    pub quota_exhausted: AtomicBool,
    pub fail_bind: AtomicBool,
    pub fail_unbind: AtomicBool,
    pub fail_delete: AtomicBool,
    pub delete_reports_missing: AtomicBool,
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port owned by `device`
    pub fn add_port(&self, id: &str, device: Option<&str>, fixed_ip: &str) {
        self.ports.lock().unwrap().push(ExternalPort {
            id: id.to_string(),
            device_id: device.map(str::to_string),
            fixed_ip_address: Some(ip(fixed_ip)),
        });
    }

    /// Add an address object no local record knows about
    pub fn add_foreign_address(&self, external_id: &str, address: &str) {
        self.addresses.lock().unwrap().insert(
            external_id.to_string(),
            ExternalAddressView {
                external_id: external_id.to_string(),
                address: ip(address),
                port_id: None,
                fixed_ip_address: None,
                instance_id: None,
            },
        );
    }

    /// Delete an address behind the service's back
    pub fn remove_out_of_band(&self, external_id: &str) {
        self.addresses.lock().unwrap().remove(external_id);
    }

    /// Rebind an address behind the service's back
    pub fn rebind_out_of_band(&self, external_id: &str, port: Option<&str>, fixed_ip: Option<&str>) {
        if let Some(view) = self.addresses.lock().unwrap().get_mut(external_id) {
            view.port_id = port.map(str::to_string);
            view.fixed_ip_address = fixed_ip.map(ip);
        }
    }

    pub fn address_count(&self) -> usize {
        self.addresses.lock().unwrap().len()
    }

    pub fn view(&self, external_id: &str) -> Option<ExternalAddressView> {
        self.addresses.lock().unwrap().get(external_id).cloned()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Total external calls that change state
    pub fn mutating_calls(&self) -> usize {
        Self::calls(&self.create_calls)
            + Self::calls(&self.delete_calls)
            + Self::calls(&self.bind_calls)
            + Self::calls(&self.unbind_calls)
    }
}

#[async_trait]
impl NetworkController for FakeController {
    async fn create_address(&self, spec: &CreateAddressSpec) -> Result<ExternalAddressView> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(spec.floating_network_id, PUBLIC_NETWORK);
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(Error::quota_exceeded("floatingip quota exceeded"));
        }

        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let view = ExternalAddressView {
            external_id: format!("fip-{}", n),
            address: ip(&format!("203.0.113.{}", n)),
            port_id: None,
            fixed_ip_address: None,
            instance_id: None,
        };
        self.addresses
            .lock()
            .unwrap()
            .insert(view.external_id.clone(), view.clone());
        Ok(view)
    }

    async fn delete_address(&self, external_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "delete failed"));
        }
        let removed = self.addresses.lock().unwrap().remove(external_id);
        if removed.is_none() || self.delete_reports_missing.load(Ordering::SeqCst) {
            return Err(Error::not_found(format!("floatingip {}", external_id)));
        }
        Ok(())
    }

    async fn bind_address(&self, external_id: &str, port_id: &str, fixed_ip: IpAddr) -> Result<()> {
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_bind.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "bind failed"));
        }
        let mut addresses = self.addresses.lock().unwrap();
        let view = addresses
            .get_mut(external_id)
            .ok_or_else(|| Error::not_found(external_id.to_string()))?;
        view.port_id = Some(port_id.to_string());
        view.fixed_ip_address = Some(fixed_ip);
        Ok(())
    }

    async fn unbind_address(&self, external_id: &str) -> Result<()> {
        self.unbind_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unbind.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "unbind failed"));
        }
        let mut addresses = self.addresses.lock().unwrap();
        let view = addresses
            .get_mut(external_id)
            .ok_or_else(|| Error::not_found(external_id.to_string()))?;
        view.port_id = None;
        view.fixed_ip_address = None;
        Ok(())
    }

    async fn list_addresses(&self, owner: &str) -> Result<Vec<ExternalAddressView>> {
        assert_eq!(owner, PROJECT);
        Ok(self.addresses.lock().unwrap().values().cloned().collect())
    }

    async fn list_ports(&self, owner: &str) -> Result<Vec<ExternalPort>> {
        assert_eq!(owner, PROJECT);
        self.list_port_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ports.lock().unwrap().clone())
    }

    async fn show_address(&self, external_id: &str) -> Result<ExternalAddressView> {
        self.show_calls.fetch_add(1, Ordering::SeqCst);
        self.view(external_id)
            .ok_or_else(|| Error::not_found(format!("floatingip {}", external_id)))
    }

    fn controller_name(&self) -> &'static str {
        "fake"
    }
}

/// In-memory legacy compute API
#[derive(Default)]
pub struct FakeLegacy {
    ips: Mutex<Vec<ExternalAddressView>>,
    next: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub add_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    pub quota_exhausted: AtomicBool,
}

impl FakeLegacy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.ips.lock().unwrap().len()
    }

    pub fn instance_of(&self, public_ip: IpAddr) -> Option<String> {
        self.ips
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.address == public_ip)
            .and_then(|v| v.instance_id.clone())
    }

    pub fn calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
            + self.add_calls.load(Ordering::SeqCst)
            + self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegacyComputeClient for FakeLegacy {
    async fn create_floating_ip(&self) -> Result<ExternalAddressView> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(Error::quota_exceeded("floating ips"));
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let view = ExternalAddressView {
            external_id: format!("nova-{}", n),
            address: ip(&format!("198.51.100.{}", n)),
            port_id: None,
            fixed_ip_address: None,
            instance_id: None,
        };
        self.ips.lock().unwrap().push(view.clone());
        Ok(view)
    }

    async fn delete_floating_ip(&self, external_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.ips.lock().unwrap().retain(|v| v.external_id != external_id);
        Ok(())
    }

    async fn list_floating_ips(&self) -> Result<Vec<ExternalAddressView>> {
        Ok(self.ips.lock().unwrap().clone())
    }

    async fn add_floating_ip(&self, instance_id: &str, public_ip: IpAddr) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        for view in self.ips.lock().unwrap().iter_mut() {
            if view.address == public_ip {
                view.instance_id = Some(instance_id.to_string());
            }
        }
        Ok(())
    }

    async fn remove_floating_ip(&self, instance_id: &str, public_ip: IpAddr) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        for view in self.ips.lock().unwrap().iter_mut() {
            if view.address == public_ip && view.instance_id.as_deref() == Some(instance_id) {
                view.instance_id = None;
            }
        }
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "fake-legacy"
    }
}

/// Probe answering from a script, then from a default
pub struct ScriptedProbe {
    default: Mutex<LivenessStatus>,
    script: Mutex<VecDeque<LivenessStatus>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(default: LivenessStatus) -> Self {
        Self {
            default: Mutex::new(default),
            script: Mutex::new(VecDeque::new()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_default(&self, status: LivenessStatus) {
        *self.default.lock().unwrap() = status;
    }

    pub fn push(&self, status: LivenessStatus) {
        self.script.lock().unwrap().push_back(status);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    async fn probe(&self, _public_ip: IpAddr) -> Result<LivenessStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::provider("scripted", "looking glass unreachable"));
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or(*self.default.lock().unwrap()))
    }

    fn probe_name(&self) -> &'static str {
        "scripted"
    }
}

/// Memory store with injectable write failures
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryAddressStore,
    pub fail_add: AtomicBool,
    pub fail_update: AtomicBool,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn tombstones(&self) -> usize {
        self.inner.tombstones().await
    }

    pub async fn record(&self, id: &str) -> Option<AddressRecord> {
        self.inner.get(id).await.unwrap()
    }

    pub fn touched(&self) -> usize {
        self.writes.load(Ordering::SeqCst) + self.reads.load(Ordering::SeqCst)
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AddressStore for FlakyStore {
    async fn add(&self, record: &AddressRecord) -> Result<()> {
        self.write();
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::store("injected add failure"));
        }
        self.inner.add(record).await
    }

    async fn update(&self, record: &AddressRecord) -> Result<()> {
        self.write();
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(Error::store("injected update failure"));
        }
        self.inner.update(record).await
    }

    async fn delete(&self, id: &str) -> Result<AddressRecord> {
        self.write();
        self.inner.delete(id).await
    }

    async fn restore(&self, record: &AddressRecord) -> Result<()> {
        self.write();
        self.inner.restore(record).await
    }

    async fn purge(&self, id: &str) -> Result<()> {
        self.write();
        self.inner.purge(id).await
    }

    async fn get(&self, id: &str) -> Result<Option<AddressRecord>> {
        self.read();
        self.inner.get(id).await
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AddressRecord>> {
        self.read();
        self.inner.get_by_external_id(external_id).await
    }

    async fn get_by_public_ip(&self, public_ip: IpAddr) -> Result<Option<AddressRecord>> {
        self.read();
        self.inner.get_by_public_ip(public_ip).await
    }

    async fn list(&self) -> Result<Vec<AddressRecord>> {
        self.read();
        self.inner.list().await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Configuration pointing at the doubles
pub fn config(backend: BackendKind) -> EipConfig {
    EipConfig {
        backend,
        controller: ControllerConfig::Custom {
            factory: "fake".into(),
            config: serde_json::json!({}),
        },
        probe: ProbeConfig::Static {
            status: LivenessStatus::Pending,
        },
        store: StoreConfig::Memory,
        service: ServiceConfig::new(PROJECT, PUBLIC_NETWORK),
    }
}

/// A service wired to fresh doubles
pub struct Harness {
    pub service: AddressService,
    pub events: mpsc::Receiver<AddressEvent>,
    pub controller: Arc<FakeController>,
    pub legacy: Arc<FakeLegacy>,
    pub probe: Arc<ScriptedProbe>,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub fn new(backend: BackendKind) -> Self {
        let controller = Arc::new(FakeController::new());
        let legacy = Arc::new(FakeLegacy::new());
        let probe = Arc::new(ScriptedProbe::new(LivenessStatus::Pending));
        let store = Arc::new(FlakyStore::new());

        let parts = BackendParts {
            controller: Some(controller.clone() as Arc<dyn NetworkController>),
            legacy: legacy.clone(),
            resolver: None,
            store: store.clone(),
            probe: probe.clone(),
        };
        let (service, events) =
            AddressService::new(parts, &config(backend)).expect("service construction succeeds");

        Self {
            service,
            events,
            controller,
            legacy,
            probe,
            store,
        }
    }

    pub fn overlay() -> Self {
        Self::new(BackendKind::Overlay)
    }

    /// Allocate an overlay address, returning its allocation id
    pub async fn allocate_vpc(&self) -> String {
        self.service
            .allocate_address(Some("vpc"))
            .await
            .expect("allocation succeeds")
            .allocation_id
            .expect("vpc addresses carry an allocation id")
    }

    /// Events emitted so far
    pub fn drain_events(&mut self) -> Vec<AddressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
