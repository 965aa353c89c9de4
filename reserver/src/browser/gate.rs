//! Login and queue traversal.
//!
//! Produces a page that sits on the reservation screen with an
//! authenticated session. Everything after this point assumes that state.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{info, instrument, warn};

use crate::browser::webdriver::By;
use crate::browser::{PortalPage, SessionError};

const LOGIN_ID_FIELD: &str = "input[name=\"login_id\"]";
const LOGIN_PASSWORD_FIELD: &str = "input[name=\"login_pwd\"]";
const LOGIN_BUTTON: &str = "//*[@id=\"content\"]/div/div/div/button";
const RESERVATION_LINK: &str = "일일입장 예약신청";
const RESERVATION_TAB: &str = "#tab_by_date";

/// URL fragments that mean the browser is still on the SSO screens.
const SSO_MARKERS: [&str; 2] = ["/sso/usr/login", "SSOService"];

pub struct GateSettings<'a> {
    pub login_url: &'a str,
    pub login_id: &'a str,
    pub login_password: &'a str,
    pub login_timeout: Duration,
    pub queue_timeout: Duration,
}

/// Logs in, then follows the reservation link through the queue.
#[instrument(skip_all, fields(component = "gate"))]
pub async fn pass_gate(page: &PortalPage, settings: &GateSettings<'_>) -> Result<(), SessionError> {
    login(page, settings).await?;
    enter_reservation_page(page, settings.queue_timeout).await
}

async fn login(page: &PortalPage, settings: &GateSettings<'_>) -> Result<(), SessionError> {
    let driver = page.driver();
    driver.navigate(settings.login_url).await?;

    let id_field = page
        .wait_for(By::Css(LOGIN_ID_FIELD), "login form", Duration::from_secs(10))
        .await?;
    let id_field = id_field
        .first()
        .ok_or_else(|| SessionError::NotFound("login id field".into()))?;
    driver.send_keys(id_field, settings.login_id).await?;

    let pwd = driver
        .first(By::Css(LOGIN_PASSWORD_FIELD))
        .await?
        .ok_or_else(|| SessionError::NotFound("login password field".into()))?;
    driver.send_keys(&pwd, settings.login_password).await?;

    let button = page
        .wait_for(By::XPath(LOGIN_BUTTON), "login button", Duration::from_secs(10))
        .await?;
    let button = button
        .first()
        .ok_or_else(|| SessionError::NotFound("login button".into()))?;
    driver.click(button).await?;

    // "Already logged in" prompt.
    if let Ok(Some(text)) = driver.alert_text().await {
        info!(prompt = %text, "login prompt accepted");
        driver.accept_alert().await?;
    }

    let deadline = Instant::now() + settings.login_timeout;
    loop {
        sleep(Duration::from_secs(1)).await;
        let url = driver.current_url().await?;
        if !SSO_MARKERS.iter().any(|m| url.contains(m)) {
            info!(url = %url, "login complete");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(SessionError::Timeout {
                step: "login",
                after: settings.login_timeout,
            });
        }
    }
}

async fn enter_reservation_page(page: &PortalPage, timeout: Duration) -> Result<(), SessionError> {
    page.wait_ready(Duration::from_secs(60)).await?;

    let link = page
        .wait_for(By::LinkText(RESERVATION_LINK), "reservation link", Duration::from_secs(60))
        .await?;
    let link = link
        .first()
        .ok_or_else(|| SessionError::NotFound("reservation link".into()))?;
    page.driver().click(link).await?;

    info!("waiting for the queue");
    let started = Instant::now();
    let mut last_log = started;

    loop {
        match page.driver().first(By::Css(RESERVATION_TAB)).await {
            Ok(Some(_)) => {
                info!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "reservation page reached"
                );
                return Ok(());
            }
            Ok(None) => {}
            // The queue page reloads itself; transient driver errors are expected.
            Err(e) => warn!(error = %e, "queue poll failed"),
        }

        if started.elapsed() >= timeout {
            return Err(SessionError::Timeout {
                step: "queue",
                after: timeout,
            });
        }
        if last_log.elapsed() >= Duration::from_secs(5) {
            info!(waited_s = started.elapsed().as_secs(), "still queued");
            last_log = Instant::now();
        }

        sleep(Duration::from_millis(100)).await;
    }
}
