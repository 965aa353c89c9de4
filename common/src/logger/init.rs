use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use super::LogCapture;

static LOGGER_INIT: OnceCell<LogCapture> = OnceCell::new();

/// Installs the global subscriber once and returns the shared log capture.
///
/// `json` switches stdout to JSON lines (production); otherwise output is
/// pretty-printed. Calling this again returns the capture from the first call.
pub fn init_tracing(json: bool) -> LogCapture {
    LOGGER_INIT
        .get_or_init(|| {
            let capture = LogCapture::default();
            let env_filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

            let base = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                // Includes timing when the span closes
                .with_span_events(fmt::format::FmtSpan::CLOSE);

            if json {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(base.json())
                    .with(capture.clone())
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(base.pretty())
                    .with(capture.clone())
                    .init();
            }

            tracing::info!(json, "logger initialized");
            capture
        })
        .clone()
}
