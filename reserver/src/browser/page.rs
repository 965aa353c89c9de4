use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::browser::webdriver::{By, ElementRef, WebDriver};
use crate::browser::{CourtSelection, LiveSession, SessionError};
use crate::model::CourtId;
use crate::portal::SessionCookie;

const DATE_LINKS: &str = "//tbody//a[starts-with(@href, 'javascript:fn_tennis_time_list')]";
const TIME_SLOTS: &str = "ul#time_con li";
const SLOT_CHECKBOX: &str = "input[type=\"checkbox\"]";
const CAPTCHA_IMAGE: &str = "//*[@id=\"layer_captcha_wrap\"]/div/img";
const CAPTCHA_REFRESH: &str = "//*[@id=\"layer_captcha_wrap\"]//input[@value=\"새로고침\"]";
const NO_RESERVE_MARKER: &str = "btn_tennis_noreserve";

/// Prompt texts that mean the clicked court cannot be booked.
const COURT_REFUSALS: [&str; 2] = ["예약이 완료된 코트입니다", "예약이 불가"];

/// Hour shown by the first time-slot row.
const FIRST_SLOT_HOUR: u32 = 6;

const POLL: Duration = Duration::from_millis(100);

fn court_marker(court: CourtId) -> String {
    format!("#tennis_court_img_a_1_{}", court.number())
}

/// The portal's reservation page, driven through WebDriver.
pub struct PortalPage {
    driver: WebDriver,
}

impl PortalPage {
    pub fn new(driver: WebDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    pub async fn close(self) {
        if let Err(e) = self.driver.quit().await {
            warn!(error = %e, "failed to close browser session");
        }
    }

    /// Polls `by` until at least one element is present.
    pub(crate) async fn wait_for(
        &self,
        by: By<'_>,
        step: &'static str,
        timeout: Duration,
    ) -> Result<Vec<ElementRef>, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let found = self.driver.find_elements(by).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout {
                    step,
                    after: timeout,
                });
            }
            sleep(POLL).await;
        }
    }

    pub(crate) async fn wait_ready(&self, timeout: Duration) -> Result<(), SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.driver.execute("return document.readyState", vec![]).await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout {
                    step: "page load",
                    after: timeout,
                });
            }
            sleep(POLL).await;
        }
    }

    async fn slot_checkboxes(&self) -> Result<Vec<Option<ElementRef>>, SessionError> {
        let rows = self.driver.find_elements(By::Css(TIME_SLOTS)).await?;
        let mut boxes = Vec::with_capacity(rows.len());
        for row in &rows {
            let cb = self
                .driver
                .find_elements_in(row, By::Css(SLOT_CHECKBOX))
                .await?
                .into_iter()
                .next();
            boxes.push(cb);
        }
        Ok(boxes)
    }

    async fn toggle(&self, checkbox: &ElementRef) -> Result<(), SessionError> {
        self.driver.click(checkbox).await?;
        self.try_dismiss_prompt_inner().await;
        Ok(())
    }

    async fn try_dismiss_prompt_inner(&self) -> bool {
        match self.driver.alert_text().await {
            Ok(Some(text)) => {
                debug!(prompt = %text, "dismissing prompt");
                self.driver.accept_alert().await.is_ok()
            }
            Ok(None) => false,
            Err(e) => {
                debug!(error = %e, "prompt check failed");
                false
            }
        }
    }
}

#[async_trait]
impl LiveSession for PortalPage {
    #[instrument(skip(self))]
    async fn refresh(&mut self) -> Result<(), SessionError> {
        self.driver.refresh().await?;
        info!("reservation page refreshed");
        Ok(())
    }

    async fn wait_for_dates(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let links = self
            .wait_for(By::XPath(DATE_LINKS), "reservable dates", timeout)
            .await?;
        info!(dates = links.len(), "reservable dates rendered");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn select_latest_date(&mut self) -> Result<(), SessionError> {
        self.wait_ready(Duration::from_secs(10)).await?;

        let links = self
            .wait_for(By::XPath(DATE_LINKS), "reservable dates", Duration::from_secs(10))
            .await?;
        let last = links
            .last()
            .ok_or_else(|| SessionError::NotFound("reservable date link".into()))?;
        self.driver.click(last).await?;

        self.wait_for(By::Css(TIME_SLOTS), "time slots", Duration::from_secs(10))
            .await?;
        sleep(Duration::from_millis(300)).await;

        info!(candidates = links.len(), "latest date selected");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn select_window(
        &mut self,
        start_hour: u32,
        slot_count: usize,
    ) -> Result<(), SessionError> {
        let boxes = self.slot_checkboxes().await?;
        if boxes.is_empty() {
            return Err(SessionError::NotFound("time slot list".into()));
        }

        let first = start_hour
            .checked_sub(FIRST_SLOT_HOUR)
            .ok_or_else(|| SessionError::NotFound(format!("slot row for {start_hour:02}:00")))?
            as usize;

        for idx in first..first + slot_count {
            let cb = boxes
                .get(idx)
                .and_then(Option::as_ref)
                .ok_or_else(|| SessionError::NotFound(format!("slot row {idx}")))?;
            if !self.driver.is_selected(cb).await? {
                self.toggle(cb).await?;
                sleep(Duration::from_millis(150)).await;
            }
        }

        // Court markers refresh asynchronously after the last toggle.
        sleep(Duration::from_millis(300)).await;
        Ok(())
    }

    async fn clear_selection(&mut self) -> Result<(), SessionError> {
        for cb in self.slot_checkboxes().await?.into_iter().flatten() {
            if self.driver.is_selected(&cb).await? {
                self.toggle(&cb).await?;
            }
        }
        Ok(())
    }

    async fn read_courts(&mut self, courts: &[CourtId]) -> Result<Vec<CourtId>, SessionError> {
        let mut available = Vec::new();
        for &court in courts {
            let Some(marker) = self.driver.first(By::Css(&court_marker(court))).await? else {
                continue;
            };
            let Some(img) = self
                .driver
                .find_elements_in(&marker, By::Css("img"))
                .await?
                .into_iter()
                .next()
            else {
                continue;
            };
            let src = self.driver.attribute(&img, "src").await?.unwrap_or_default();
            if !src.contains(NO_RESERVE_MARKER) {
                available.push(court);
            }
        }
        Ok(available)
    }

    #[instrument(skip(self), fields(court = court.number()))]
    async fn select_court(&mut self, court: CourtId) -> Result<CourtSelection, SessionError> {
        let marker = self
            .driver
            .first(By::Css(&court_marker(court)))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("court {court} marker")))?;
        self.driver.click(&marker).await?;

        sleep(Duration::from_millis(300)).await;

        if let Some(text) = self.driver.alert_text().await? {
            self.driver.accept_alert().await?;
            if COURT_REFUSALS.iter().any(|r| text.contains(r)) {
                return Ok(CourtSelection::Unavailable(text));
            }
            debug!(prompt = %text, "court prompt accepted");
        }

        Ok(CourtSelection::Selected)
    }

    async fn captcha_image(&mut self, timeout: Duration) -> Result<Option<String>, SessionError> {
        let img = match self
            .wait_for(By::XPath(CAPTCHA_IMAGE), "challenge image", timeout)
            .await
        {
            Ok(found) => found.into_iter().next(),
            Err(SessionError::Timeout { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(img) = img else { return Ok(None) };

        // Wait for the image to have a rendered size before capturing it.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let size = self
                .driver
                .execute(
                    "var r = arguments[0].getBoundingClientRect(); return r.width * r.height;",
                    vec![img.to_json()],
                )
                .await?;
            if size.as_f64().unwrap_or(0.0) > 0.0 || Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(200)).await;
        }

        let png = self.driver.element_screenshot(&img).await?;
        Ok(Some(png))
    }

    async fn refresh_captcha(&mut self) -> Result<(), SessionError> {
        if let Some(btn) = self.driver.first(By::XPath(CAPTCHA_REFRESH)).await? {
            self.driver.click(&btn).await?;
            sleep(Duration::from_millis(500)).await;
        }
        Ok(())
    }

    async fn try_dismiss_prompt(&mut self) -> bool {
        self.try_dismiss_prompt_inner().await
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, SessionError> {
        Ok(self.driver.cookies().await?)
    }

    async fn user_agent(&mut self) -> Result<String, SessionError> {
        match self.driver.execute("return navigator.userAgent", vec![]).await? {
            Value::String(ua) => Ok(ua),
            other => Err(SessionError::Rejected(format!("unexpected user agent: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn court_marker_selector() {
        assert_eq!(court_marker(CourtId(13)), "#tennis_court_img_a_1_13");
    }
}
