use std::str::FromStr;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::settings::LogSettings;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logger(settings: &LogSettings) -> anyhow::Result<()> {
    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .with_ansi(settings.ansi_colors);

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Logging initialized");
    Ok(())
}
