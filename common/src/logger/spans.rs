use std::time::Duration;

use tracing::{Span, field};

use super::TraceId;

/// Root span for one reservation run.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "run",
        name = %name,
        trace_id = %trace_id,
        strategy = field::Empty,
        court = field::Empty
    )
}

/// Child span; inherits the trace id from the enclosing run span.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "step",
        name = %name,
        strategy = field::Empty,
        court = field::Empty
    )
}

/// Records the strategy (and court, once known) on the current span.
pub fn annotate_span(strategy: &str, court: Option<u32>) {
    let span = Span::current();
    span.record("strategy", field::display(strategy));
    if let Some(c) = court {
        span.record("court", c);
    }
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
