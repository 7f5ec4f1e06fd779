use std::str::FromStr;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const DEBUG_FILTER: &str = "info,microbit_btle=debug,btleplug=debug,bluez_async=debug";

/// Logs go to stderr; stdout carries the readings.
///
/// `RUST_LOG` wins over `--debug` when set.
pub fn init_logger(debug: bool) {
    let fallback = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug),
        )
        .init();
}
