use uuid::Uuid;

use crate::gatt::CapabilityTable;
use crate::types::{ConnectionHandle, DiscoveredDevice};

/// Link state reported by a transport for one connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Everything a transport reports asynchronously.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    DiscoveryHit(DiscoveredDevice),
    ConnectionStateChanged {
        handle: ConnectionHandle,
        state: LinkState,
    },
    CapabilitiesReceived {
        handle: ConnectionHandle,
        table: CapabilityTable,
    },
    CharacteristicChanged {
        handle: ConnectionHandle,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

/// Commands the GUI hands to the command task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiSignal {
    StartScanning,
    ConnectDevice(String),
    Disconnect,
}
