use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ScanError, SessionError};
use crate::scan::ScanAggregator;
use crate::session::SessionStateMachine;
use crate::signal::TransportEvent;
use crate::store::{state_store, StateObserver};
use crate::transport::Transport;

/// Entry point for the presentation layer: three commands plus the state to observe.
///
/// Building a client spawns the task that feeds transport events to the scan
/// aggregator and the session, so it must be created inside a tokio runtime.
pub struct HeartRateClient {
    scan: Arc<ScanAggregator>,
    session: Arc<SessionStateMachine>,
    observer: StateObserver,
    shutdown: CancellationToken,
    pump: JoinHandle<()>,
}

impl HeartRateClient {
    pub fn new(transport: Arc<dyn Transport>, events: UnboundedReceiver<TransportEvent>) -> Self {
        let (scan_publisher, session_publisher, observer) = state_store();
        let shutdown = CancellationToken::new();

        let scan = Arc::new(ScanAggregator::new(
            transport.clone(),
            scan_publisher,
            shutdown.child_token(),
        ));
        let session = Arc::new(SessionStateMachine::new(transport, session_publisher));

        let pump = tokio::spawn(pump_events(
            events,
            scan.clone(),
            session.clone(),
            shutdown.child_token(),
        ));

        HeartRateClient {
            scan,
            session,
            observer,
            shutdown,
            pump,
        }
    }

    pub async fn start_scan(&self) -> Result<(), ScanError> {
        self.scan.start_scan().await
    }

    pub async fn connect(&self, identity: &str) -> Result<(), SessionError> {
        self.session.connect(identity).await
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.session.disconnect().await
    }

    pub fn observer(&self) -> StateObserver {
        self.observer.clone()
    }

    /// Stop routing events and close any open scan window.
    pub async fn shutdown(self) {
        info!("Shutting down heart rate client");
        self.shutdown.cancel();
        let _ = self.pump.await;
    }
}

async fn pump_events(
    mut events: UnboundedReceiver<TransportEvent>,
    scan: Arc<ScanAggregator>,
    session: Arc<SessionStateMachine>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = shutdown.cancelled() => break,
        };
        match event {
            Some(TransportEvent::DiscoveryHit(device)) => scan.on_discovery(device),
            Some(event) => session.handle_event(event).await,
            None => {
                info!("Transport event channel closed");
                break;
            }
        }
    }
    debug!("Event pump stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::{self, UnboundedSender};

    use super::*;
    use crate::gatt::{HEART_RATE_MEASUREMENT_UUID, SCAN_WINDOW};
    use crate::measurement::Measurement;
    use crate::mock::{heart_rate_table, Call, MockTransport};
    use crate::signal::LinkState;
    use crate::types::{ConnectionHandle, ConnectionState, DiscoveredDevice};

    fn client() -> (HeartRateClient, Arc<MockTransport>, UnboundedSender<TransportEvent>) {
        let transport = Arc::new(MockTransport::new());
        let (tx, rx) = mpsc::unbounded_channel();
        (HeartRateClient::new(transport.clone(), rx), transport, tx)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn scan_end_to_end() {
        let (client, _transport, tx) = client();
        let observer = client.observer();

        client.start_scan().await.unwrap();
        tx.send(TransportEvent::DiscoveryHit(DiscoveredDevice::new("AA:BB", None, -70, true))).unwrap();
        tx.send(TransportEvent::DiscoveryHit(DiscoveredDevice::new("AA:BB", None, -60, true))).unwrap();
        tx.send(TransportEvent::DiscoveryHit(DiscoveredDevice::new("CC:DD", None, -80, true))).unwrap();

        tokio::time::sleep(SCAN_WINDOW + Duration::from_millis(10)).await;

        let state = observer.snapshot();
        assert!(!state.scanning);
        let mut results = state.scan_results.unwrap();
        results.sort_by(|a, b| a.identity.cmp(&b.identity));
        assert_eq!(
            results,
            vec![
                DiscoveredDevice::new("AA:BB", None, -60, true),
                DiscoveredDevice::new("CC:DD", None, -80, true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_end_to_end() {
        let (client, transport, tx) = client();
        let observer = client.observer();
        let handle = ConnectionHandle(1);

        client.connect("AA:BB").await.unwrap();
        tx.send(TransportEvent::ConnectionStateChanged { handle, state: LinkState::Connected }).unwrap();
        tx.send(TransportEvent::CapabilitiesReceived { handle, table: heart_rate_table() }).unwrap();
        tx.send(TransportEvent::CharacteristicChanged {
            handle,
            characteristic: HEART_RATE_MEASUREMENT_UUID,
            value: vec![0x00, 64],
        })
        .unwrap();
        settle().await;

        let state = observer.snapshot();
        assert_eq!(state.connection_state, ConnectionState::Connected);
        assert_eq!(state.last_measurement, Measurement::Bpm(64));

        client.disconnect().await.unwrap();
        tx.send(TransportEvent::ConnectionStateChanged { handle, state: LinkState::Disconnected }).unwrap();
        tx.send(TransportEvent::ConnectionStateChanged { handle, state: LinkState::Disconnected }).unwrap();
        settle().await;

        let state = observer.snapshot();
        assert_eq!(state.connection_state, ConnectionState::Disconnected);
        assert_eq!(state.last_measurement, Measurement::NoData);
        assert_eq!(transport.count(|c| matches!(c, Call::Release(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_open_window() {
        let (client, transport, _tx) = client();
        let observer = client.observer();

        client.start_scan().await.unwrap();
        client.shutdown().await;
        settle().await;

        assert!(!observer.snapshot().scanning);
        assert_eq!(observer.snapshot().scan_results, Some(vec![]));
        assert_eq!(transport.count(|c| *c == Call::StopDiscovery), 1);
    }
}
