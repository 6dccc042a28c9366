//! Connection lifecycle for the single heart rate session.
//!
//! Commands and transport events take the session lock, so they are applied
//! one at a time in arrival order. Subscribing is the exception: the lock is
//! dropped around its GATT round trips and the session re-checked after. Every event
//! carries the handle it belongs to; events for a handle the session does not
//! own any more are dropped.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::gatt::{self, CapabilityTable, ENABLE_NOTIFICATION_VALUE, HEART_RATE_MEASUREMENT_UUID};
use crate::measurement::{decode_heart_rate, Measurement};
use crate::signal::{LinkState, TransportEvent};
use crate::store::SessionPublisher;
use crate::transport::Transport;
use crate::types::{ConnectionHandle, ConnectionState};

#[derive(Default)]
struct Session {
    state: ConnectionState,
    handle: Option<ConnectionHandle>,
    identity: Option<String>,
    subscribed: bool,
    teardown_requested: bool,
}

impl Session {
    fn owns(&self, handle: ConnectionHandle) -> bool {
        self.handle == Some(handle)
    }

    fn may_subscribe(&self, handle: ConnectionHandle) -> bool {
        self.owns(handle)
            && self.state == ConnectionState::Connected
            && !self.subscribed
            && !self.teardown_requested
    }
}

pub struct SessionStateMachine {
    transport: Arc<dyn Transport>,
    publisher: SessionPublisher,
    session: Mutex<Session>,
}

impl SessionStateMachine {
    pub fn new(transport: Arc<dyn Transport>, publisher: SessionPublisher) -> Self {
        SessionStateMachine {
            transport,
            publisher,
            session: Mutex::new(Session::default()),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.session.lock().await.state
    }

    /// Start connecting to `identity`. Rejected while another session is
    /// connecting or connected.
    pub async fn connect(&self, identity: &str) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        if session.state != ConnectionState::Disconnected {
            warn!(
                "Connect to {} rejected, session with {:?} is {:?}",
                identity, session.identity, session.state
            );
            return Err(SessionError::Busy(session.state));
        }

        info!("Connecting to {}", identity);
        self.transition(&mut session, ConnectionState::Connecting);

        match self.transport.connect(identity).await {
            Ok(handle) => {
                debug!("Connection {} allocated for {}", handle, identity);
                session.handle = Some(handle);
                session.identity = Some(identity.to_string());
                session.subscribed = false;
                session.teardown_requested = false;
                Ok(())
            }
            Err(e) => {
                warn!("Error connecting to {}: {}", identity, e);
                self.transition(&mut session, ConnectionState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Ask the transport to drop the link. The handle is released when the
    /// resulting disconnection event arrives.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        let Some(handle) = session.handle else {
            debug!("Disconnect requested with no open session");
            return Ok(());
        };

        info!("Disconnecting from {:?}", session.identity);
        session.teardown_requested = true;
        self.transport.disconnect(handle).await?;
        Ok(())
    }

    /// Apply one transport event. Discovery hits are not session events and
    /// are ignored here.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged { handle, state: LinkState::Connected } => {
                self.on_connected(handle).await
            }
            TransportEvent::ConnectionStateChanged { handle, state: LinkState::Disconnected } => {
                self.on_disconnected(handle).await
            }
            TransportEvent::CapabilitiesReceived { handle, table } => {
                self.on_capabilities(handle, table).await
            }
            TransportEvent::CharacteristicChanged { handle, characteristic, value } => {
                self.on_characteristic_changed(handle, characteristic, &value).await
            }
            TransportEvent::DiscoveryHit(_) => {}
        }
    }

    fn transition(&self, session: &mut Session, state: ConnectionState) {
        session.state = state;
        self.publisher.set_connection_state(state);
    }

    async fn on_connected(&self, handle: ConnectionHandle) {
        let mut session = self.session.lock().await;
        if !session.owns(handle) || session.state != ConnectionState::Connecting {
            debug!("Ignoring stale connected event for {}", handle);
            return;
        }

        info!("Connected to {:?}, starting service discovery", session.identity);
        self.transition(&mut session, ConnectionState::Connected);

        if let Err(e) = self.transport.discover_capabilities(handle).await {
            warn!("Service discovery could not be started on {}: {}", handle, e);
        }
    }

    async fn on_capabilities(&self, handle: ConnectionHandle, table: CapabilityTable) {
        let subscription = {
            let session = self.session.lock().await;
            if !session.may_subscribe(handle) {
                debug!("Ignoring capability table for {}", handle);
                return;
            }

            for service in &table.services {
                debug!("Service UUID: {}", service.uuid);
            }

            let Some(subscription) = gatt::find_heart_rate_subscription(&table) else {
                warn!("No notifiable heart rate measurement on {:?}", session.identity);
                return;
            };
            subscription
        };

        // not locked across GATT round trips, the session is re-checked after each
        match self.transport.enable_notifications(handle, &subscription.measurement).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Heart rate measurement does not support notifications");
                return;
            }
            Err(e) => {
                warn!("Enabling notifications failed: {}", e);
                return;
            }
        }

        let Some(descriptor) = subscription.config_descriptor else {
            warn!("Heart rate measurement has no client configuration descriptor");
            return;
        };

        let still_wanted = self.session.lock().await.may_subscribe(handle);
        if !still_wanted {
            debug!("Session for {} ended while enabling notifications", handle);
            return;
        }

        if let Err(e) = self.transport.write_descriptor(handle, &descriptor, &ENABLE_NOTIFICATION_VALUE).await {
            warn!("Writing the notification descriptor failed: {}", e);
            return;
        }

        let mut session = self.session.lock().await;
        if session.may_subscribe(handle) {
            info!("Subscribed to heart rate notifications");
            session.subscribed = true;
        }
    }

    async fn on_characteristic_changed(&self, handle: ConnectionHandle, characteristic: Uuid, value: &[u8]) {
        let session = self.session.lock().await;
        if !session.owns(handle) || session.state != ConnectionState::Connected {
            debug!("Ignoring value change for {}", handle);
            return;
        }
        if characteristic != HEART_RATE_MEASUREMENT_UUID {
            return;
        }

        let measurement = decode_heart_rate(value);
        if !measurement.is_valid() {
            debug!("Malformed heart rate payload: {:02X?}", value);
        }
        self.publisher.set_measurement(measurement);
    }

    async fn on_disconnected(&self, handle: ConnectionHandle) {
        let mut session = self.session.lock().await;
        if !session.owns(handle) {
            debug!("Ignoring disconnect for {} (already released)", handle);
            return;
        }

        info!("Disconnected from {:?}", session.identity);
        // taking the handle here is what makes release happen exactly once
        session.handle = None;
        session.identity = None;
        session.subscribed = false;
        session.teardown_requested = false;
        self.transition(&mut session, ConnectionState::Disconnected);
        self.publisher.set_measurement(Measurement::NoData);

        if let Err(e) = self.transport.disconnect(handle).await {
            debug!("Cleanup disconnect of {} failed: {}", handle, e);
        }
        self.transport.release(handle).await;
    }
}
