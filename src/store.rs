//! State published to the presentation layer.
//!
//! Each field has its own watch channel and exactly one writer: the scan
//! aggregator holds a [`ScanPublisher`], the session holds a [`SessionPublisher`].
//! Readers get a [`StateObserver`].

use tokio::sync::watch;

use crate::measurement::Measurement;
use crate::types::{ConnectionState, DiscoveredDevice};

/// A point-in-time copy of everything the presentation may show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishedState {
    /// `None` until the first scan window closes
    pub scan_results: Option<Vec<DiscoveredDevice>>,
    pub scanning: bool,
    pub connection_state: ConnectionState,
    pub last_measurement: Measurement,
}

pub struct ScanPublisher {
    scan_results: watch::Sender<Option<Vec<DiscoveredDevice>>>,
    scanning: watch::Sender<bool>,
}

impl ScanPublisher {
    pub fn set_scanning(&self, scanning: bool) {
        self.scanning.send_replace(scanning);
    }

    pub fn publish_results(&self, devices: Vec<DiscoveredDevice>) {
        self.scan_results.send_replace(Some(devices));
    }
}

pub struct SessionPublisher {
    connection_state: watch::Sender<ConnectionState>,
    last_measurement: watch::Sender<Measurement>,
}

impl SessionPublisher {
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection_state.send_replace(state);
    }

    pub fn set_measurement(&self, measurement: Measurement) {
        self.last_measurement.send_replace(measurement);
    }
}

#[derive(Clone)]
pub struct StateObserver {
    scan_results: watch::Receiver<Option<Vec<DiscoveredDevice>>>,
    scanning: watch::Receiver<bool>,
    connection_state: watch::Receiver<ConnectionState>,
    last_measurement: watch::Receiver<Measurement>,
}

impl StateObserver {
    pub fn snapshot(&self) -> PublishedState {
        PublishedState {
            scan_results: self.scan_results.borrow().clone(),
            scanning: *self.scanning.borrow(),
            connection_state: *self.connection_state.borrow(),
            last_measurement: *self.last_measurement.borrow(),
        }
    }

    pub fn scan_results(&self) -> watch::Receiver<Option<Vec<DiscoveredDevice>>> {
        self.scan_results.clone()
    }

    pub fn scanning(&self) -> watch::Receiver<bool> {
        self.scanning.clone()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.clone()
    }

    pub fn last_measurement(&self) -> watch::Receiver<Measurement> {
        self.last_measurement.clone()
    }
}

/// Create the store, split into its two writers and a reader.
pub fn state_store() -> (ScanPublisher, SessionPublisher, StateObserver) {
    let initial = PublishedState::default();
    let (scan_results_tx, scan_results_rx) = watch::channel(initial.scan_results);
    let (scanning_tx, scanning_rx) = watch::channel(initial.scanning);
    let (connection_tx, connection_rx) = watch::channel(initial.connection_state);
    let (measurement_tx, measurement_rx) = watch::channel(initial.last_measurement);

    (
        ScanPublisher {
            scan_results: scan_results_tx,
            scanning: scanning_tx,
        },
        SessionPublisher {
            connection_state: connection_tx,
            last_measurement: measurement_tx,
        },
        StateObserver {
            scan_results: scan_results_rx,
            scanning: scanning_rx,
            connection_state: connection_rx,
            last_measurement: measurement_rx,
        },
    )
}
