use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::LOG_FILE_ENV;

pub fn init_tracing() {
    init_tracing_with_filter("info");
}

/// Install the global subscriber. `RUST_LOG` overrides `default_filter`.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing_with_filter(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(env_filter));

    // Check if file logging is enabled via environment variable
    if let Ok(log_path) = std::env::var(LOG_FILE_ENV) {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(LevelFilter::DEBUG);

                if registry.with(file_layer).try_init().is_ok() {
                    tracing::info!("File logging enabled: {}", log_path);
                }
                return;
            }
            Err(e) => eprintln!("Failed to open log file {}: {}", log_path, e),
        }
    }

    let _ = registry.try_init();
}
