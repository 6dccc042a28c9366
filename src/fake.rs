//! A radio-free [`Transport`] that behaves like a chest strap and a couple of
//! other advertisers. Handy for running the GUI on a machine without Bluetooth.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::gatt::{
    CapabilityTable, CharacteristicId, CharacteristicInfo, DescriptorId, ServiceInfo, BATTERY_LEVEL_UUID,
    BATTERY_SERVICE_UUID, CLIENT_CHARACTERISTIC_CONFIG_UUID, ENABLE_NOTIFICATION_VALUE,
    HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
};
use crate::signal::{LinkState, TransportEvent};
use crate::transport::{ScanProfile, Transport};
use crate::types::{ConnectionHandle, DiscoveredDevice};

pub const SIMULATED_STRAP: &str = "C0:FF:EE:00:18:0D";

const ADVERTISERS: &[(&str, Option<&str>, i16, bool)] = &[
    (SIMULATED_STRAP, Some("Simulated HR Strap"), -58, true),
    ("C0:FF:EE:00:00:01", None, -81, false),
    ("C0:FF:EE:00:00:02", Some("Kitchen Scale"), -74, true),
];

const ADVERTISING_INTERVAL: Duration = Duration::from_millis(250);
const CONNECT_DELAY: Duration = Duration::from_millis(300);
const NOTIFY_INTERVAL: Duration = Duration::from_millis(800);

struct Link {
    identity: String,
    cancel: CancellationToken,
}

pub struct SimulatedTransport {
    events: UnboundedSender<TransportEvent>,
    links: Mutex<HashMap<ConnectionHandle, Link>>,
    next_handle: AtomicU64,
    advertising: Mutex<Option<CancellationToken>>,
}

impl SimulatedTransport {
    pub fn new(events: UnboundedSender<TransportEvent>) -> Self {
        SimulatedTransport {
            events,
            links: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            advertising: Mutex::new(None),
        }
    }

    fn links(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, Link>> {
        self.links.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn link_token(&self, handle: ConnectionHandle) -> Result<(String, CancellationToken), TransportError> {
        self.links()
            .get(&handle)
            .map(|link| (link.identity.clone(), link.cancel.clone()))
            .ok_or(TransportError::UnknownHandle(handle))
    }

    fn send_link_state(&self, handle: ConnectionHandle, state: LinkState) {
        let _ = self.events.send(TransportEvent::ConnectionStateChanged { handle, state });
    }
}

fn simulated_table(identity: &str) -> CapabilityTable {
    let mut services = vec![ServiceInfo {
        uuid: BATTERY_SERVICE_UUID,
        characteristics: vec![CharacteristicInfo {
            uuid: BATTERY_LEVEL_UUID,
            notifiable: false,
            descriptors: vec![],
        }],
    }];
    if identity == SIMULATED_STRAP {
        services.push(ServiceInfo {
            uuid: HEART_RATE_SERVICE_UUID,
            characteristics: vec![CharacteristicInfo {
                uuid: HEART_RATE_MEASUREMENT_UUID,
                notifiable: true,
                descriptors: vec![CLIENT_CHARACTERISTIC_CONFIG_UUID],
            }],
        });
    }
    CapabilityTable { services }
}

/// Mostly 8-bit readings, with the odd 16-bit one so both formats get exercised.
fn heart_rate_payload() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let bpm: u16 = rng.gen_range(50..70);
    if rng.gen_bool(0.2) {
        let [lo, hi] = bpm.to_le_bytes();
        vec![0x01, lo, hi]
    } else {
        vec![0x00, bpm as u8]
    }
}

async fn advertise(events: UnboundedSender<TransportEvent>, cancel: CancellationToken) {
    loop {
        for (identity, name, rssi, connectable) in ADVERTISERS {
            let jitter: i16 = rand::thread_rng().gen_range(-3..=3);
            let device = DiscoveredDevice::new(*identity, name.map(str::to_string), rssi + jitter, *connectable);
            if events.send(TransportEvent::DiscoveryHit(device)).is_err() {
                return;
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(ADVERTISING_INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

async fn transmit_heart_rate(handle: ConnectionHandle, events: UnboundedSender<TransportEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(NOTIFY_INTERVAL) => {}
            _ = cancel.cancelled() => break,
        }
        let event = TransportEvent::CharacteristicChanged {
            handle,
            characteristic: HEART_RATE_MEASUREMENT_UUID,
            value: heart_rate_payload(),
        };
        if events.send(event).is_err() {
            break;
        }
    }
    debug!("Simulated notifications for {} stopped", handle);
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn start_discovery(&self, profile: ScanProfile) -> Result<(), TransportError> {
        debug!("Simulated scan started with {:?}", profile);
        let cancel = CancellationToken::new();
        let previous = self
            .advertising
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        tokio::spawn(advertise(self.events.clone(), cancel));
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), TransportError> {
        let current = self
            .advertising
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(cancel) = current {
            cancel.cancel();
        }
        Ok(())
    }

    async fn connect(&self, identity: &str) -> Result<ConnectionHandle, TransportError> {
        let Some((_, _, _, connectable)) = ADVERTISERS.iter().find(|(known, ..)| *known == identity) else {
            return Err(TransportError::UnknownDevice(identity.to_string()));
        };
        if !connectable {
            return Err(TransportError::Rejected(format!("{identity} does not accept connections")));
        }

        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        self.links().insert(
            handle,
            Link {
                identity: identity.to_string(),
                cancel: cancel.clone(),
            },
        );

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(CONNECT_DELAY) => {
                    let _ = events.send(TransportEvent::ConnectionStateChanged {
                        handle,
                        state: LinkState::Connected,
                    });
                }
                _ = cancel.cancelled() => {}
            }
        });

        info!("Simulated connect to {} as {}", identity, handle);
        Ok(handle)
    }

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        let (_, cancel) = self.link_token(handle)?;
        if !cancel.is_cancelled() {
            cancel.cancel();
            self.send_link_state(handle, LinkState::Disconnected);
        }
        Ok(())
    }

    async fn release(&self, handle: ConnectionHandle) {
        let link = self.links().remove(&handle);
        if let Some(link) = link {
            link.cancel.cancel();
        }
    }

    async fn discover_capabilities(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        let (identity, _) = self.link_token(handle)?;
        let _ = self.events.send(TransportEvent::CapabilitiesReceived {
            handle,
            table: simulated_table(&identity),
        });
        Ok(())
    }

    async fn enable_notifications(
        &self,
        handle: ConnectionHandle,
        characteristic: &CharacteristicId,
    ) -> Result<bool, TransportError> {
        self.link_token(handle)?;
        Ok(characteristic.characteristic == HEART_RATE_MEASUREMENT_UUID)
    }

    async fn write_descriptor(
        &self,
        handle: ConnectionHandle,
        descriptor: &DescriptorId,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let (_, cancel) = self.link_token(handle)?;
        if descriptor.descriptor != CLIENT_CHARACTERISTIC_CONFIG_UUID {
            return Err(TransportError::AttributeNotFound(descriptor.descriptor));
        }
        if descriptor.characteristic == HEART_RATE_MEASUREMENT_UUID && value == ENABLE_NOTIFICATION_VALUE {
            tokio::spawn(transmit_heart_rate(handle, self.events.clone(), cancel.child_token()));
        }
        Ok(())
    }
}
