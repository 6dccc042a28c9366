use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const SETTINGS_DIR: &str = "hrlink";
const SETTINGS_FILE: &str = "settings.json";

/// Which radio backend the binary drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Bluetooth,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default)]
    pub show_thread_ids: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            ansi_colors: true,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
    /// Index into the adapters btleplug reports
    #[serde(default)]
    pub adapter_index: usize,
    #[serde(default)]
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            adapter_index: 0,
            log: LogSettings::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_transport() -> TransportKind {
    TransportKind::Bluetooth
}

impl Settings {
    /// Load from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            // logging is configured from these settings, so it is not up yet
            eprintln!("Ignoring unreadable settings at {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push(SETTINGS_DIR);
        path.push(SETTINGS_FILE);
        Some(path)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }
}
