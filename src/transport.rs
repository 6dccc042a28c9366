//! The radio capability interface the core drives.
//!
//! Commands go through [`Transport`]; results that arrive later are pushed by the
//! implementation as [`TransportEvent`](crate::signal::TransportEvent)s on the
//! channel it was built with.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::gatt::{CharacteristicId, DescriptorId};
use crate::types::ConnectionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Scan continuously at the highest duty cycle the radio offers
    LowLatency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProfile {
    pub mode: ScanMode,
    /// Zero means every advertisement is reported as soon as it is seen
    pub report_delay: Duration,
}

impl ScanProfile {
    pub const LOW_LATENCY: ScanProfile = ScanProfile {
        mode: ScanMode::LowLatency,
        report_delay: Duration::ZERO,
    };
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn start_discovery(&self, profile: ScanProfile) -> Result<(), TransportError>;

    async fn stop_discovery(&self) -> Result<(), TransportError>;

    /// Begin connecting. Completion is reported with a `ConnectionStateChanged` event.
    async fn connect(&self, identity: &str) -> Result<ConnectionHandle, TransportError>;

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError>;

    /// Drop every resource tied to `handle`. Called once per handle.
    async fn release(&self, handle: ConnectionHandle);

    /// Results are reported with a `CapabilitiesReceived` event.
    async fn discover_capabilities(&self, handle: ConnectionHandle) -> Result<(), TransportError>;

    /// Turn on local delivery of value changes. `false` when the peripheral
    /// cannot notify on that characteristic.
    async fn enable_notifications(
        &self,
        handle: ConnectionHandle,
        characteristic: &CharacteristicId,
    ) -> Result<bool, TransportError>;

    async fn write_descriptor(
        &self,
        handle: ConnectionHandle,
        descriptor: &DescriptorId,
        value: &[u8],
    ) -> Result<(), TransportError>;
}
