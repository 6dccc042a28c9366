use std::fmt;

/// A peripheral seen during a scan window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Hardware address, used as the device identity
    pub identity: String,
    /// Advertised local name, if the peripheral sent one
    pub name: Option<String>,
    /// Signal strength in dBm
    pub rssi: i16,
    pub connectable: bool,
}

impl DiscoveredDevice {
    pub fn new(identity: impl Into<String>, name: Option<String>, rssi: i16, connectable: bool) -> Self {
        DiscoveredDevice {
            identity: identity.into(),
            name,
            rssi,
            connectable,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("UNKNOWN")
    }
}

/// Opaque handle a transport hands out for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(text)
    }
}
