use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Portal local time zone (UTC+09:00, no DST).
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Wall-clock source for everything that compares against the opening instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&kst())
    }
}

/// Local clock shifted by a measured server offset.
#[derive(Clone, Debug)]
pub struct OffsetClock<C> {
    inner: C,
    offset: TimeDelta,
}

impl<C: Clock> OffsetClock<C> {
    pub fn new(inner: C, offset: TimeDelta) -> Self {
        Self { inner, offset }
    }
}

impl<C: Clock> Clock for OffsetClock<C> {
    fn now(&self) -> DateTime<FixedOffset> {
        self.inner.now() + self.offset
    }
}

/// Smallest observed offset. The `Date` header truncates to whole seconds,
/// so the minimum is the estimate least likely to put us early.
pub fn conservative_offset(samples: &[TimeDelta]) -> Option<TimeDelta> {
    samples.iter().min().copied()
}

/// Samples the server `Date` header `samples` times and returns the
/// conservative server-minus-local offset. `None` when no sample carried a
/// usable header.
#[instrument(skip(http), fields(url = %url))]
pub async fn measure_server_offset(
    http: &reqwest::Client,
    url: &str,
    samples: usize,
) -> Option<TimeDelta> {
    let mut offsets = Vec::with_capacity(samples);

    for i in 0..samples {
        let before = Utc::now();
        let resp = match http.head(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, sample = i, "server time sample failed");
                continue;
            }
        };
        let after = Utc::now();
        let midpoint = before + (after - before) / 2;

        let server = resp
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok());

        if let Some(server) = server {
            let offset = server.with_timezone(&Utc) - midpoint;
            debug!(sample = i, offset_ms = offset.num_milliseconds(), "server time sample");
            offsets.push(offset);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let chosen = conservative_offset(&offsets);
    if let Some(o) = chosen {
        info!(offset_ms = o.num_milliseconds(), samples = offsets.len(), "server clock offset measured");
    }
    chosen
}
