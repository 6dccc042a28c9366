use thiserror::Error;

use crate::types::{ConnectionHandle, ConnectionState};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("device {0} is not known to the adapter")]
    UnknownDevice(String),
    #[error("connection {0} is not open")]
    UnknownHandle(ConnectionHandle),
    #[error("characteristic or descriptor not found: {0}")]
    AttributeNotFound(uuid::Uuid),
    #[error("bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),
    #[error("transport rejected the command: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan window is already running")]
    AlreadyScanning,
    #[error("failed to start discovery: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already {0:?}")]
    Busy(ConnectionState),
    #[error("transport command failed: {0}")]
    Transport(#[from] TransportError),
}
