pub mod logger;

pub use logger::{LogCapture, TraceId, init_tracing};
