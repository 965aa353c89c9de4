//! Opening-time synchronization.
//!
//! The portal releases slots at a fixed wall-clock instant. Waiting happens in
//! two stages: a cheap timer sleep until shortly before the instant, then a
//! tight spin on a blocking thread so the refresh lands just after it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta};
use tracing::{info, instrument, warn};

use crate::browser::{LiveSession, SessionHandle};
use crate::error::RunError;
use crate::time::{Clock, kst};

/// Remaining time below which the coarse sleep hands over to the spin.
const SPIN_LEAD: Duration = Duration::from_secs(10);
const SPIN_STEP: Duration = Duration::from_micros(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitReport {
    /// The target had already passed when waiting started.
    pub late: bool,
    /// How far past the target the wait actually ended.
    pub overshoot: TimeDelta,
}

pub struct OpeningSynchronizer {
    clock: Arc<dyn Clock>,
    open_hour: u32,
    open_minute: u32,
    margin: Duration,
}

impl OpeningSynchronizer {
    pub fn new(clock: Arc<dyn Clock>, open_hour: u32, open_minute: u32, margin: Duration) -> Self {
        Self {
            clock,
            open_hour,
            open_minute,
            margin,
        }
    }

    /// Today's opening instant (portal time) plus the safety margin.
    pub fn target(&self) -> Result<DateTime<FixedOffset>, RunError> {
        let now = self.clock.now().with_timezone(&kst());
        let margin = TimeDelta::from_std(self.margin)
            .map_err(|e| RunError::Sync(format!("invalid margin: {e}")))?;

        now.date_naive()
            .and_hms_opt(self.open_hour, self.open_minute, 0)
            .and_then(|t| t.and_local_timezone(kst()).single())
            .map(|t| t + margin)
            .ok_or_else(|| {
                RunError::Sync(format!(
                    "invalid opening time {:02}:{:02}",
                    self.open_hour, self.open_minute
                ))
            })
    }

    /// Current instant; used when the run should not wait at all.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    /// Returns once the clock reads at least `target`.
    #[instrument(skip_all, fields(target = %target.format("%H:%M:%S%.3f")))]
    pub async fn wait_until(&self, target: DateTime<FixedOffset>) -> WaitReport {
        let remaining = target - self.clock.now();
        if remaining <= TimeDelta::zero() {
            info!(
                behind_ms = -remaining.num_milliseconds(),
                "opening instant already passed, proceeding immediately"
            );
            return WaitReport {
                late: true,
                overshoot: -remaining,
            };
        }

        let remaining = remaining.to_std().unwrap_or_default();
        if remaining > SPIN_LEAD {
            let coarse = remaining - SPIN_LEAD;
            info!(sleep_s = coarse.as_secs_f64(), "sleeping until final approach");
            tokio::time::sleep(coarse).await;
        }

        info!("final approach");
        let clock = Arc::clone(&self.clock);
        let spun = tokio::task::spawn_blocking(move || {
            loop {
                let now = clock.now();
                if now >= target {
                    return now;
                }
                std::thread::sleep(SPIN_STEP);
            }
        })
        .await;

        let reached = match spun {
            Ok(now) => now,
            Err(e) => {
                // Spin thread lost; fall back to the timer.
                warn!(error = %e, "spin wait failed");
                let rest = (target - self.clock.now()).to_std().unwrap_or_default();
                tokio::time::sleep(rest).await;
                self.clock.now()
            }
        };

        let overshoot = reached - target;
        info!(
            at = %reached.format("%H:%M:%S%.3f"),
            overshoot_us = overshoot.num_microseconds().unwrap_or_default(),
            "opening instant reached"
        );

        WaitReport {
            late: false,
            overshoot,
        }
    }

    /// Waits for `target`, refreshes the page exactly once and waits for the
    /// reservable dates to render.
    pub async fn open<S: LiveSession>(
        &self,
        session: &mut SessionHandle<S>,
        target: DateTime<FixedOffset>,
        dates_timeout: Duration,
    ) -> Result<WaitReport, RunError> {
        let report = self.wait_until(target).await;

        session
            .refresh()
            .await
            .map_err(|e| RunError::Sync(format!("refresh failed: {e}")))?;
        session
            .wait_for_dates(dates_timeout)
            .await
            .map_err(|e| RunError::Sync(format!("reservable dates did not appear: {e}")))?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::time::testing::SteppingClock;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    fn sync(clock: SteppingClock) -> OpeningSynchronizer {
        OpeningSynchronizer::new(Arc::new(clock), 9, 0, Duration::from_millis(100))
    }

    #[test]
    fn target_is_today_at_opening_plus_margin() {
        let s = sync(SteppingClock::new(at(8, 40, 0), TimeDelta::zero()));
        assert_eq!(s.target().unwrap(), at(9, 0, 0) + TimeDelta::milliseconds(100));
    }

    #[tokio::test(start_paused = true)]
    async fn coarse_sleep_then_spin_reaches_target() {
        let clock = SteppingClock::new(at(8, 59, 0), TimeDelta::milliseconds(100));
        let s = sync(clock.clone());
        let target = s.target().unwrap();

        let started = tokio::time::Instant::now();
        let report = s.wait_until(target).await;

        assert!(!report.late);
        assert!(report.overshoot >= TimeDelta::zero());
        assert!(clock.peek() >= target);
        // 60.1s away: everything except the last 10s is a timer sleep.
        assert!(started.elapsed() >= Duration::from_millis(50_000));
    }

    #[tokio::test(start_paused = true)]
    async fn past_target_proceeds_immediately() {
        let clock = SteppingClock::new(at(9, 0, 5), TimeDelta::zero());
        let s = sync(clock);
        let target = s.target().unwrap();

        let started = tokio::time::Instant::now();
        let report = s.wait_until(target).await;

        assert!(report.late);
        assert_eq!(report.overshoot, TimeDelta::milliseconds(4_900));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn short_wait_skips_coarse_sleep() {
        let clock = SteppingClock::new(at(9, 0, 0), TimeDelta::milliseconds(20));
        let s = sync(clock.clone());
        let target = s.target().unwrap();

        let report = s.wait_until(target).await;

        assert!(!report.late);
        assert!(clock.peek() >= target);
    }
}
