//! Client core for BLE heart rate sensors: scan for peripherals, hold one
//! session, subscribe to Heart Rate Measurement notifications and publish the
//! decoded values for a UI to observe.

pub mod btle;
pub mod client;
pub mod error;
pub mod fake;
pub mod gatt;
pub mod logging;
pub mod measurement;
pub mod scan;
pub mod session;
pub mod settings;
pub mod signal;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

pub use client::HeartRateClient;
pub use error::{ScanError, SessionError, TransportError};
pub use measurement::{decode_heart_rate, Measurement};
pub use signal::{GuiSignal, LinkState, TransportEvent};
pub use store::{PublishedState, StateObserver};
pub use transport::{ScanProfile, Transport};
pub use types::{ConnectionHandle, ConnectionState, DiscoveredDevice};
