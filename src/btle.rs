use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral, PeripheralId};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::gatt::{CapabilityTable, CharacteristicId, CharacteristicInfo, DescriptorId, ServiceInfo};
use crate::signal::{LinkState, TransportEvent};
use crate::transport::{ScanProfile, Transport};
use crate::types::{ConnectionHandle, DiscoveredDevice};

type Links = Arc<Mutex<HashMap<ConnectionHandle, Link>>>;

struct Link {
    peripheral: PlatformPeripheral,
    cancel: CancellationToken,
}

/// [`Transport`] backed by the host Bluetooth adapter through btleplug.
pub struct BtleplugTransport {
    adapter: Adapter,
    events: UnboundedSender<TransportEvent>,
    links: Links,
    next_handle: AtomicU64,
    shutdown: CancellationToken,
}

impl BtleplugTransport {
    pub async fn new(adapter_index: usize, events: UnboundedSender<TransportEvent>) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter_list = manager.adapters().await?;

        if adapter_list.is_empty() {
            warn!("No Bluetooth adapters found");
        }
        for adapter in adapter_list.iter() {
            info!(
                "Adapter: {}",
                adapter.adapter_info().await.unwrap_or("No name adapter".to_string())
            );
        }

        // TODO: let the GUI pick between adapters instead of the settings index
        let adapter = adapter_list
            .into_iter()
            .nth(adapter_index)
            .ok_or(TransportError::NoAdapter)?;

        let central_events = adapter.events().await?;
        let links: Links = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(forward_central_events(
            adapter.clone(),
            central_events,
            events.clone(),
            links.clone(),
            shutdown.clone(),
        ));

        Ok(BtleplugTransport {
            adapter,
            events,
            links,
            next_handle: AtomicU64::new(1),
            shutdown,
        })
    }

    fn links(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, Link>> {
        lock_links(&self.links)
    }

    fn peripheral(&self, handle: ConnectionHandle) -> Result<PlatformPeripheral, TransportError> {
        self.links()
            .get(&handle)
            .map(|link| link.peripheral.clone())
            .ok_or(TransportError::UnknownHandle(handle))
    }

    async fn find_peripheral(&self, identity: &str) -> Result<PlatformPeripheral, TransportError> {
        // peripherals contains everything seen so far, some may have gone out of range
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string() == identity {
                return Ok(peripheral);
            }
        }
        Err(TransportError::UnknownDevice(identity.to_string()))
    }

    fn find_characteristic(
        peripheral: &PlatformPeripheral,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or(TransportError::AttributeNotFound(characteristic))
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock_links(links: &Links) -> MutexGuard<'_, HashMap<ConnectionHandle, Link>> {
    links.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for BtleplugTransport {
    async fn start_discovery(&self, profile: ScanProfile) -> Result<(), TransportError> {
        // btleplug exposes no scan mode or report batching, it always reports immediately
        debug!("Starting scan, requested profile {:?}", profile);
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), TransportError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, identity: &str) -> Result<ConnectionHandle, TransportError> {
        let peripheral = self.find_peripheral(identity).await?;
        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let cancel = self.shutdown.child_token();

        self.links().insert(
            handle,
            Link {
                peripheral: peripheral.clone(),
                cancel: cancel.clone(),
            },
        );
        tokio::spawn(run_link(handle, peripheral, self.events.clone(), cancel));

        Ok(handle)
    }

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        let (peripheral, cancel) = {
            let links = self.links();
            let link = links.get(&handle).ok_or(TransportError::UnknownHandle(handle))?;
            (link.peripheral.clone(), link.cancel.clone())
        };

        close_link(handle, &cancel, &self.events, drop_link(&peripheral)).await
    }

    async fn release(&self, handle: ConnectionHandle) {
        let link = self.links().remove(&handle);
        if let Some(link) = link {
            link.cancel.cancel();
            debug!("Released connection {}", handle);
        }
    }

    async fn discover_capabilities(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(handle)?;
        let events = self.events.clone();

        tokio::spawn(async move {
            if let Err(e) = peripheral.discover_services().await {
                warn!("Service discovery failed on {}: {}", handle, e);
                return;
            }
            let table = capability_table(&peripheral);
            let _ = events.send(TransportEvent::CapabilitiesReceived { handle, table });
        });

        Ok(())
    }

    async fn enable_notifications(
        &self,
        handle: ConnectionHandle,
        characteristic: &CharacteristicId,
    ) -> Result<bool, TransportError> {
        let peripheral = self.peripheral(handle)?;
        let target = Self::find_characteristic(&peripheral, characteristic.service, characteristic.characteristic)?;

        if !target.properties.contains(CharPropFlags::NOTIFY) {
            return Ok(false);
        }

        info!("Subscribing to characteristic {:?}", target.uuid);
        peripheral.subscribe(&target).await?;
        Ok(true)
    }

    async fn write_descriptor(
        &self,
        handle: ConnectionHandle,
        descriptor: &DescriptorId,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let peripheral = self.peripheral(handle)?;
        let characteristic = Self::find_characteristic(&peripheral, descriptor.service, descriptor.characteristic)?;
        let target = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == descriptor.descriptor)
            .ok_or(TransportError::AttributeNotFound(descriptor.descriptor))?;

        peripheral.write_descriptor(target, value).await?;
        Ok(())
    }
}

fn capability_table(peripheral: &PlatformPeripheral) -> CapabilityTable {
    let services = peripheral
        .services()
        .into_iter()
        .map(|service| ServiceInfo {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .iter()
                .map(|c| CharacteristicInfo {
                    uuid: c.uuid,
                    notifiable: c.properties.contains(CharPropFlags::NOTIFY),
                    descriptors: c.descriptors.iter().map(|d| d.uuid).collect(),
                })
                .collect(),
        })
        .collect();

    CapabilityTable { services }
}

/// Drive one connection: connect, then forward notifications until cancelled.
/// Cancel the link's tasks and run `teardown`. The first request for a handle
/// always reports the link as down, whatever `teardown` returns: not every
/// platform emits a central event for a local disconnect.
async fn close_link(
    handle: ConnectionHandle,
    cancel: &CancellationToken,
    events: &UnboundedSender<TransportEvent>,
    teardown: impl Future<Output = Result<(), TransportError>>,
) -> Result<(), TransportError> {
    let first_request = !cancel.is_cancelled();
    cancel.cancel();

    let result = teardown.await;
    if let Err(e) = &result {
        warn!("Disconnecting {} failed: {}", handle, e);
    }

    if first_request {
        let _ = events.send(TransportEvent::ConnectionStateChanged {
            handle,
            state: LinkState::Disconnected,
        });
    }
    result
}

async fn drop_link(peripheral: &PlatformPeripheral) -> Result<(), TransportError> {
    if peripheral.is_connected().await? {
        info!("Disconnecting from peripheral {}", peripheral.address());
        peripheral.disconnect().await?;
    }
    Ok(())
}

async fn run_link(
    handle: ConnectionHandle,
    peripheral: PlatformPeripheral,
    events: UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        result = peripheral.connect() => result,
        _ = cancel.cancelled() => {
            debug!("Connection attempt {} cancelled", handle);
            return;
        }
    };

    if let Err(err) = connected {
        warn!("Error connecting to peripheral {}: {}", peripheral.address(), err);
        let _ = events.send(TransportEvent::ConnectionStateChanged {
            handle,
            state: LinkState::Disconnected,
        });
        return;
    }

    let _ = events.send(TransportEvent::ConnectionStateChanged {
        handle,
        state: LinkState::Connected,
    });

    let mut notifications = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Notification stream unavailable for {}: {}", handle, e);
            return;
        }
    };

    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(data) = notification else { break };
                let _ = events.send(TransportEvent::CharacteristicChanged {
                    handle,
                    characteristic: data.uuid,
                    value: data.value,
                });
            }
            _ = cancel.cancelled() => break,
        }
    }
    debug!("Notification stream for {} ended", handle);
}

async fn forward_central_events(
    adapter: Adapter,
    mut central_events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    events: UnboundedSender<TransportEvent>,
    links: Links,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = central_events.next() => event,
            _ = shutdown.cancelled() => break,
        };
        let Some(event) = event else { break };

        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if let Some(device) = discovered_device(&adapter, &id).await {
                    let _ = events.send(TransportEvent::DiscoveryHit(device));
                }
            }
            CentralEvent::DeviceDisconnected(id) => {
                let handles: Vec<ConnectionHandle> = lock_links(&links)
                    .iter()
                    .filter(|(_, link)| link.peripheral.id() == id)
                    .map(|(handle, _)| *handle)
                    .collect();
                for handle in handles {
                    let _ = events.send(TransportEvent::ConnectionStateChanged {
                        handle,
                        state: LinkState::Disconnected,
                    });
                }
            }
            _ => {}
        }
    }
    debug!("Central event stream closed");
}

async fn discovered_device(adapter: &Adapter, id: &PeripheralId) -> Option<DiscoveredDevice> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    // cached entries without a fresh advertisement carry no RSSI
    let rssi = properties.rssi?;

    // btleplug does not surface the advertisement's connectable bit
    Some(DiscoveredDevice::new(
        properties.address.to_string(),
        properties.local_name,
        rssi,
        true,
    ))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn failed_disconnect_still_reports_link_down_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = ConnectionHandle(7);

        let failing = async { Err::<(), _>(TransportError::Rejected("adapter gone".into())) };
        assert!(close_link(handle, &cancel, &tx, failing).await.is_err());
        assert!(cancel.is_cancelled());
        assert!(matches!(
            rx.try_recv(),
            Ok(TransportEvent::ConnectionStateChanged { handle: ConnectionHandle(7), state: LinkState::Disconnected })
        ));

        close_link(handle, &cancel, &tx, async { Ok::<(), TransportError>(()) }).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
