use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use eframe::egui;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use hrlink::btle::BtleplugTransport;
use hrlink::fake::SimulatedTransport;
use hrlink::logging;
use hrlink::settings::{Settings, TransportKind};
use hrlink::{ConnectionState, GuiSignal, HeartRateClient, StateObserver, Transport};

mod widget;

const MAX_FPS: f64 = 165.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load();
    logging::init_logger(&settings.log)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = match settings.transport {
        TransportKind::Bluetooth => Arc::new(BtleplugTransport::new(settings.adapter_index, tx).await?),
        TransportKind::Simulated => {
            info!("Using the simulated transport");
            Arc::new(SimulatedTransport::new(tx))
        }
    };

    let client = HeartRateClient::new(transport, rx);
    let observer = client.observer();

    let (tx_from_gui, rx_from_gui) = mpsc::unbounded_channel();
    tokio::spawn(run_commands(client, rx_from_gui));

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "hrlink",
        native_options,
        Box::new(move |cc| Ok(Box::new(MyApp::new(cc, observer, tx_from_gui)))),
    )
    .map_err(|e| anyhow!("GUI exited with an error: {e}"))?;

    Ok(())
}

/// Apply GUI commands one at a time until the GUI goes away.
async fn run_commands(client: HeartRateClient, mut rx_from_gui: UnboundedReceiver<GuiSignal>) {
    while let Some(signal) = rx_from_gui.recv().await {
        let result: anyhow::Result<()> = match &signal {
            GuiSignal::StartScanning => client.start_scan().await.map_err(Into::into),
            GuiSignal::ConnectDevice(identity) => client.connect(identity).await.map_err(Into::into),
            GuiSignal::Disconnect => client.disconnect().await.map_err(Into::into),
        };
        if let Err(e) = result {
            warn!("{:?} failed: {}", signal, e);
        }
    }
    client.shutdown().await;
}

struct MyApp {
    state: StateObserver,
    frame_time: Duration,
    tx_from_gui: UnboundedSender<GuiSignal>,
}

impl MyApp {
    fn new(_cc: &eframe::CreationContext<'_>, state: StateObserver, tx_from_gui: UnboundedSender<GuiSignal>) -> Self {
        MyApp {
            state,
            frame_time: Duration::from_secs_f64(1.0 / MAX_FPS),
            tx_from_gui,
        }
    }

    fn send(&self, signal: GuiSignal) {
        let _unused_res = self.tx_from_gui.send(signal);
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.state.snapshot();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                let scan_button = widget::get_scan_button(state.scanning);
                if ui.add_enabled(!state.scanning, scan_button).clicked() {
                    self.send(GuiSignal::StartScanning);
                }

                ui.separator();

                ui.add(widget::get_connection_label(state.connection_state));
                if state.connection_state == ConnectionState::Connected {
                    ui.add(widget::get_heart_rate_label(state.last_measurement));
                    if ui.add(widget::get_disconnect_device_button()).clicked() {
                        self.send(GuiSignal::Disconnect);
                    }
                }

                ui.separator();
            });

            // devices
            match state.scan_results.as_deref() {
                None | Some([]) => {
                    ui.label("No devices found");
                }
                Some(devices) => {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for device in devices {
                            ui.horizontal(|ui| {
                                ui.add(widget::get_device_label(device));
                                let connect_button = widget::get_connect_button();
                                if ui.add_enabled(device.connectable, connect_button).clicked() {
                                    info!("Connect clicked for {}", device.identity);
                                    self.send(GuiSignal::ConnectDevice(device.identity.clone()));
                                }
                            });
                        }
                    });
                }
            }
        });

        // state changes arrive from other tasks, keep polling at a bounded rate
        ctx.request_repaint_after(self.frame_time);
    }
}
