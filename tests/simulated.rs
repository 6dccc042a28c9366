use std::sync::Arc;
use std::time::Duration;

use hrlink::fake::{SimulatedTransport, SIMULATED_STRAP};
use hrlink::gatt::SCAN_WINDOW;
use hrlink::{ConnectionState, HeartRateClient, Measurement, ScanError, SessionError};
use tokio::sync::mpsc;

fn simulated_client() -> HeartRateClient {
    let (tx, rx) = mpsc::unbounded_channel();
    HeartRateClient::new(Arc::new(SimulatedTransport::new(tx)), rx)
}

#[tokio::test(start_paused = true)]
async fn scan_connect_stream_disconnect() {
    let client = simulated_client();
    let observer = client.observer();

    client.start_scan().await.unwrap();
    assert!(matches!(client.start_scan().await, Err(ScanError::AlreadyScanning)));
    tokio::time::sleep(SCAN_WINDOW + Duration::from_millis(10)).await;

    let state = observer.snapshot();
    assert!(!state.scanning);
    let devices = state.scan_results.unwrap();
    assert_eq!(devices.len(), 3);
    let strap = devices.iter().find(|d| d.identity == SIMULATED_STRAP).unwrap();
    assert_eq!(strap.name.as_deref(), Some("Simulated HR Strap"));
    assert!(strap.connectable);

    client.connect(SIMULATED_STRAP).await.unwrap();
    assert_eq!(observer.snapshot().connection_state, ConnectionState::Connecting);
    assert!(matches!(client.connect(SIMULATED_STRAP).await, Err(SessionError::Busy(_))));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = observer.snapshot();
    assert_eq!(state.connection_state, ConnectionState::Connected);
    let bpm = state.last_measurement.bpm().expect("a reading after two seconds");
    assert!((50..70).contains(&bpm));

    client.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let state = observer.snapshot();
    assert_eq!(state.connection_state, ConnectionState::Disconnected);
    assert_eq!(state.last_measurement, Measurement::NoData);

    // the stream stops with the session
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(observer.snapshot().last_measurement, Measurement::NoData);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn device_without_heart_rate_service_stays_silent() {
    let client = simulated_client();
    let observer = client.observer();

    client.connect("C0:FF:EE:00:00:02").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let state = observer.snapshot();
    assert_eq!(state.connection_state, ConnectionState::Connected);
    assert_eq!(state.last_measurement, Measurement::NoData);
}

#[tokio::test(start_paused = true)]
async fn refused_connect_leaves_session_disconnected() {
    let client = simulated_client();
    let observer = client.observer();

    assert!(matches!(
        client.connect("C0:FF:EE:00:00:01").await,
        Err(SessionError::Transport(_))
    ));
    assert_eq!(observer.snapshot().connection_state, ConnectionState::Disconnected);
}
