use eframe::egui::{Button, Color32, Label, RichText, Rounding};

use hrlink::{ConnectionState, DiscoveredDevice, Measurement};

pub fn get_heart_rate_label(measurement: Measurement) -> Label {
    let live_hr_text = RichText::new(format!("{} BPM", measurement))
        .color(Color32::RED)
        .background_color(Color32::WHITE)
        .size(40.0);

    Label::new(live_hr_text)
}

pub fn get_scan_button(scanning: bool) -> Button<'static> {
    let text = if scanning { "Scanning" } else { "Scan Now" };
    let scan_text = RichText::new(text)
        .color(Color32::WHITE)
        .size(20.0);

    Button::new(scan_text)
        .fill(Color32::BLUE)
        .rounding(Rounding::same(8.0))
}

pub fn get_connection_label(state: ConnectionState) -> Label {
    Label::new(RichText::new(state.to_string()).size(20.0))
}

pub fn get_device_label(device: &DiscoveredDevice) -> Label {
    let device_text = RichText::new(format!(
        "{}dBm  {}  {}",
        device.rssi,
        device.display_name(),
        device.identity
    ))
    .color(Color32::WHITE)
    .background_color(Color32::BLACK)
    .size(16.0);

    Label::new(device_text)
}

pub fn get_connect_button() -> Button<'static> {
    let text = RichText::new("Connect")
        .color(Color32::WHITE)
        .size(16.0);

    Button::new(text)
        .fill(Color32::BLUE)
        .rounding(Rounding::same(8.0))
}

pub fn get_disconnect_device_button() -> Button<'static> {
    let text = RichText::new("Disconnect")
        .color(Color32::WHITE)
        .size(20.0);

    Button::new(text)
        .fill(Color32::RED)
        .rounding(Rounding::same(8.0))
}
