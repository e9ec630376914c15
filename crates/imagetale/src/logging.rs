//! Logging initialization.
//!
//! Log output goes to stderr; stdout is reserved for run reports.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at `level` (an `EnvFilter` directive).
///
/// `RUST_LOG` takes precedence when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section; `--verbose` and `--json-logs`
/// win over the file.
pub fn init_from_config(config: &imagetale_core::Config, verbose: bool, json_logs: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init(level, json_logs || config.logging.format == "json");
}
