use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::gatt::SCAN_WINDOW;
use crate::store::ScanPublisher;
use crate::transport::{ScanProfile, Transport};
use crate::types::DiscoveredDevice;

#[derive(Default)]
struct ScanWindow {
    active: bool,
    devices: HashMap<String, DiscoveredDevice>,
}

/// Collects discovery hits for one fixed-length scan window at a time.
pub struct ScanAggregator {
    transport: Arc<dyn Transport>,
    publisher: ScanPublisher,
    window: Mutex<ScanWindow>,
    shutdown: CancellationToken,
}

impl ScanAggregator {
    pub fn new(transport: Arc<dyn Transport>, publisher: ScanPublisher, shutdown: CancellationToken) -> Self {
        ScanAggregator {
            transport,
            publisher,
            window: Mutex::new(ScanWindow::default()),
            shutdown,
        }
    }

    fn window(&self) -> MutexGuard<'_, ScanWindow> {
        // the window holds plain data, a panic elsewhere cannot leave it half-updated
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a scan window. Returns once discovery is running; results are
    /// published when the window closes.
    pub async fn start_scan(self: &Arc<Self>) -> Result<(), ScanError> {
        {
            let mut window = self.window();
            if window.active {
                debug!("Scan requested while a window is open, ignoring");
                return Err(ScanError::AlreadyScanning);
            }
            window.active = true;
            window.devices.clear();
        }
        self.publisher.set_scanning(true);

        if let Err(e) = self.transport.start_discovery(ScanProfile::LOW_LATENCY).await {
            warn!("Failed to start discovery: {}", e);
            self.window().active = false;
            self.publisher.set_scanning(false);
            return Err(e.into());
        }
        info!("Scan window opened for {:?}", SCAN_WINDOW);

        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(SCAN_WINDOW) => {}
                _ = aggregator.shutdown.cancelled() => {
                    debug!("Scan window cut short by shutdown");
                }
            }
            aggregator.close_window().await;
        });

        Ok(())
    }

    /// Record a discovery hit. The latest hit for an identity replaces earlier ones.
    pub fn on_discovery(&self, device: DiscoveredDevice) {
        let mut window = self.window();
        if !window.active {
            debug!("Discovery hit for {} outside a scan window, dropping", device.identity);
            return;
        }
        debug!(
            "Device found: {} ({:?}, {} dBm, connectable: {})",
            device.identity, device.name, device.rssi, device.connectable
        );
        window.devices.insert(device.identity.clone(), device);
    }

    pub fn is_scanning(&self) -> bool {
        self.window().active
    }

    async fn close_window(&self) {
        if let Err(e) = self.transport.stop_discovery().await {
            warn!("Failed to stop discovery: {}", e);
        }

        // published under the guard so a new window cannot open in between
        let mut window = self.window();
        let devices: Vec<DiscoveredDevice> = window.devices.drain().map(|(_, device)| device).collect();
        info!("Scan window closed, {} device(s) found", devices.len());

        self.publisher.publish_results(devices);
        self.publisher.set_scanning(false);
        window.active = false;
    }
}
