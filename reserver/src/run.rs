//! One reservation run, end to end.
//!
//! Gate → opening wait → cookie hand-off → calendar lookup → date selection
//! → strategy search. Every failure is folded into the returned
//! [`ReservationResult`]; the caller reports it and picks the exit code.

use std::sync::Arc;
use std::time::Duration;

use common::logger::child_span;
use tracing::{Instrument, error, info, instrument, warn};

use crate::browser::{GateSettings, LiveSession, PortalPage, SessionHandle, WebDriver, pass_gate};
use crate::captcha::{CaptchaSolver, HttpOcrSolver};
use crate::config::{AppConfig, ProbeMode};
use crate::controller::{RetryController, RetrySettings};
use crate::error::RunError;
use crate::execution::{BookingExecutor, ExecutorSettings};
use crate::model::{ReservationResult, ReservationStrategy};
use crate::opening::OpeningSynchronizer;
use crate::portal::{PortalApi, PortalClient, PortalError};
use crate::probe::{DirectProbe, SpeculativeProbe, StateProbe};
use crate::time::{Clock, OffsetClock, SystemClock, measure_server_offset};

/// Server `Date` samples taken when aligning the clock.
const CLOCK_SAMPLES: usize = 5;

#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Start right away instead of waiting for the opening instant.
    pub immediate: bool,
}

/// Search knobs, split out of [`AppConfig`] so the search can run without
/// a full configuration.
#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    pub probe_mode: ProbeMode,
    pub retry: RetrySettings,
    pub executor: ExecutorSettings,
}

impl From<&AppConfig> for EngineSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            probe_mode: cfg.probe_mode,
            retry: RetrySettings {
                max_attempts: cfg.max_attempts,
            },
            executor: ExecutorSettings {
                captcha_attempts: cfg.captcha_attempts,
                captcha_timeout: cfg.captcha_timeout,
            },
        }
    }
}

/// Runs the whole flow against the real portal and browser.
#[instrument(skip_all, fields(component = "run", immediate = options.immediate))]
pub async fn run(config: &AppConfig, options: RunOptions) -> ReservationResult {
    let mut result = ReservationResult::default();

    if let Err(e) = drive(config, options, &mut result).await {
        error!(error = %e, "run failed");
        result.fail(e.to_string());
    }

    result
}

async fn drive(
    config: &AppConfig,
    options: RunOptions,
    result: &mut ReservationResult,
) -> Result<(), RunError> {
    let driver = WebDriver::start(&config.webdriver_url, config.headless)
        .await
        .map_err(|e| RunError::Gate(format!("browser session failed to start: {e}")))?;

    let mut session = SessionHandle::new(PortalPage::new(driver));
    let outcome = drive_session(config, options, &mut session, result).await;
    session.into_inner().close().await;
    outcome
}

async fn drive_session(
    config: &AppConfig,
    options: RunOptions,
    session: &mut SessionHandle<PortalPage>,
    result: &mut ReservationResult,
) -> Result<(), RunError> {
    let gate = GateSettings {
        login_url: &config.login_url,
        login_id: &config.login_id,
        login_password: &config.login_password,
        login_timeout: config.login_timeout,
        queue_timeout: config.queue_timeout,
    };
    pass_gate(session.session(), &gate)
        .instrument(child_span("gate"))
        .await
        .map_err(|e| RunError::Gate(e.to_string()))?;
    info!("gate passed");

    let clock = portal_clock(config).await;
    let sync = OpeningSynchronizer::new(
        Arc::clone(&clock),
        config.open_hour,
        config.open_minute,
        config.open_margin,
    );
    let target = if options.immediate {
        sync.now()
    } else {
        sync.target()?
    };
    let wait = sync
        .open(session, target, config.dates_timeout)
        .instrument(child_span("opening"))
        .await?;
    info!(
        late = wait.late,
        overshoot_ms = wait.overshoot.num_milliseconds(),
        "portal opened"
    );

    let cookies = session
        .cookies()
        .await
        .map_err(|e| RunError::Gate(format!("cookie hand-off failed: {e}")))?;
    let user_agent = session
        .user_agent()
        .await
        .map_err(|e| RunError::Gate(format!("user agent lookup failed: {e}")))?;

    let portal = PortalClient::new(&config.base_url, &cookies, &user_agent)
        .map_err(|e| RunError::Unexpected(format!("portal client: {e}")))?;
    let solver = HttpOcrSolver::new(config.ocr_url.clone(), config.captcha_timeout)
        .map_err(|e| RunError::Unexpected(format!("ocr client: {e}")))?;

    let search_date = clock.now().format("%Y%m%d").to_string();

    reserve(
        session,
        Arc::new(portal),
        Arc::new(solver),
        &config.strategies,
        &EngineSettings::from(config),
        &search_date,
        result,
    )
    .await
}

/// Local clock, shifted to the portal's clock when alignment is enabled and
/// the portal answers with a usable `Date` header.
async fn portal_clock(config: &AppConfig) -> Arc<dyn Clock> {
    if !config.sync_server_clock {
        return Arc::new(SystemClock);
    }

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "clock probe client failed, using local clock");
            return Arc::new(SystemClock);
        }
    };

    match measure_server_offset(&http, &config.base_url, CLOCK_SAMPLES).await {
        Some(offset) => Arc::new(OffsetClock::new(SystemClock, offset)),
        None => {
            warn!("server clock unavailable, using local clock");
            Arc::new(SystemClock)
        }
    }
}

/// Everything after the opening refresh: picks the latest reservable date,
/// selects it in the live session and searches the strategies.
///
/// `search_date` is today in portal time, "YYYYMMDD".
#[instrument(skip_all, fields(component = "run", search_date = %search_date))]
pub async fn reserve<S, P, C>(
    session: &mut SessionHandle<S>,
    portal: Arc<P>,
    solver: Arc<C>,
    strategies: &[ReservationStrategy],
    settings: &EngineSettings,
    search_date: &str,
    result: &mut ReservationResult,
) -> Result<(), RunError>
where
    S: LiveSession,
    P: PortalApi,
    C: CaptchaSolver,
{
    let dates = portal.calendar(search_date).await.map_err(|e| match e {
        e @ PortalError::SessionRejected { .. } => RunError::Gate(e.to_string()),
        other => RunError::Unexpected(format!("calendar lookup failed: {other}")),
    })?;

    let Some(date) = dates.last().cloned() else {
        return Err(RunError::NoSlots("no reservable date in the calendar".into()));
    };
    info!(day = %date.day, listed = dates.len(), "latest reservable date");
    result.date = Some(date.day.clone());

    session
        .select_latest_date()
        .await
        .map_err(|e| RunError::Unexpected(format!("date selection failed: {e}")))?;

    let probe: Box<dyn StateProbe<S>> = match settings.probe_mode {
        ProbeMode::Speculative => Box::new(SpeculativeProbe::new(Arc::clone(&portal))),
        ProbeMode::Direct => Box::new(DirectProbe::new(Arc::clone(&portal))),
    };
    let executor = BookingExecutor::new(portal, solver, settings.executor);

    RetryController::new(probe.as_ref(), &executor, settings.retry)
        .run(session, &date, strategies, result)
        .await
}
