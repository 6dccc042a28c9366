//! Recording transport used by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::TransportError;
use crate::gatt::{
    CapabilityTable, CharacteristicId, CharacteristicInfo, DescriptorId, ServiceInfo,
    BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID, CLIENT_CHARACTERISTIC_CONFIG_UUID,
    HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
};
use crate::transport::{ScanProfile, Transport};
use crate::types::ConnectionHandle;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    StartDiscovery(ScanProfile),
    StopDiscovery,
    Connect(String),
    Disconnect(ConnectionHandle),
    Release(ConnectionHandle),
    DiscoverCapabilities(ConnectionHandle),
    EnableNotifications(ConnectionHandle, CharacteristicId),
    WriteDescriptor(ConnectionHandle, DescriptorId, Vec<u8>),
}

pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    next_handle: AtomicU64,
    pub fail_start_discovery: AtomicBool,
    pub fail_connect: AtomicBool,
    pub notifications_supported: AtomicBool,
    /// While set, `enable_notifications` waits for `notification_gate`
    pub hold_notifications: AtomicBool,
    pub notification_gate: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            calls: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            fail_start_discovery: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            notifications_supported: AtomicBool::new(true),
            hold_notifications: AtomicBool::new(false),
            notification_gate: Notify::new(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_discovery(&self, profile: ScanProfile) -> Result<(), TransportError> {
        self.record(Call::StartDiscovery(profile));
        if self.fail_start_discovery.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("radio off".into()));
        }
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), TransportError> {
        self.record(Call::StopDiscovery);
        Ok(())
    }

    async fn connect(&self, identity: &str) -> Result<ConnectionHandle, TransportError> {
        self.record(Call::Connect(identity.to_string()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::UnknownDevice(identity.to_string()));
        }
        Ok(ConnectionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        self.record(Call::Disconnect(handle));
        Ok(())
    }

    async fn release(&self, handle: ConnectionHandle) {
        self.record(Call::Release(handle));
    }

    async fn discover_capabilities(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        self.record(Call::DiscoverCapabilities(handle));
        Ok(())
    }

    async fn enable_notifications(
        &self,
        handle: ConnectionHandle,
        characteristic: &CharacteristicId,
    ) -> Result<bool, TransportError> {
        self.record(Call::EnableNotifications(handle, *characteristic));
        if self.hold_notifications.load(Ordering::SeqCst) {
            self.notification_gate.notified().await;
        }
        Ok(self.notifications_supported.load(Ordering::SeqCst))
    }

    async fn write_descriptor(
        &self,
        handle: ConnectionHandle,
        descriptor: &DescriptorId,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.record(Call::WriteDescriptor(handle, *descriptor, value.to_vec()));
        Ok(())
    }
}

pub(crate) fn heart_rate_table() -> CapabilityTable {
    CapabilityTable {
        services: vec![
            ServiceInfo {
                uuid: BATTERY_SERVICE_UUID,
                characteristics: vec![CharacteristicInfo {
                    uuid: BATTERY_LEVEL_UUID,
                    notifiable: true,
                    descriptors: vec![CLIENT_CHARACTERISTIC_CONFIG_UUID],
                }],
            },
            ServiceInfo {
                uuid: HEART_RATE_SERVICE_UUID,
                characteristics: vec![CharacteristicInfo {
                    uuid: HEART_RATE_MEASUREMENT_UUID,
                    notifiable: true,
                    descriptors: vec![CLIENT_CHARACTERISTIC_CONFIG_UUID],
                }],
            },
        ],
    }
}
