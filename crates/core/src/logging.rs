//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor a config override is set.
pub const DEFAULT_FILTER: &str = "info,e3d=debug";

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` wins over `filter_override`, which wins over [`DEFAULT_FILTER`].
/// Calling this twice is harmless; the second registration is ignored.
///
/// # Example
/// ```
/// e3d_core::init_logging(None);
/// tracing::info!("Engine starting");
/// ```
pub fn init_logging(filter_override: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        filter_override
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
