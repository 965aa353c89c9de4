use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::browser::{CourtSelection, LiveSession, WebDriverError};
use crate::model::{CourtId, TimeWindow};
use crate::portal::SessionCookie;

/// Prompts can chain (a confirmation after an alert); stop after a few.
const MAX_PROMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("webdriver error: {0}")]
    Driver(#[from] WebDriverError),

    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Rejected(String),
}

/// What the handle knows about the page's slot checkboxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Selection {
    Clear,
    Window(u32, usize),
    /// A page action on the checkboxes did not complete; any subset may be
    /// checked.
    Unknown,
}

/// Exclusive handle to the live session.
///
/// Tracks which window is selected so at most one is ever selected: a new
/// window is only selected after the previous selection was cleared.
pub struct SessionHandle<S> {
    inner: S,
    selection: Selection,
}

impl<S: LiveSession> SessionHandle<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            selection: Selection::Clear,
        }
    }

    pub fn session(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// (start hour, slot count) of the current selection.
    pub fn selected(&self) -> Option<(u32, usize)> {
        match self.selection {
            Selection::Window(start, len) => Some((start, len)),
            Selection::Clear | Selection::Unknown => None,
        }
    }

    /// Selects `window` unless it is already the current selection.
    ///
    /// Anything but a known clean page is cleared first; a failed clear
    /// aborts before any new checkbox is touched.
    pub async fn ensure_window(&mut self, window: &TimeWindow) -> Result<(), SessionError> {
        let wanted = Selection::Window(window.start_hour(), window.len());
        if self.selection == wanted {
            debug!(window = %window.label(), "window already selected");
            return Ok(());
        }

        if self.selection != Selection::Clear {
            self.clear().await?;
        }

        self.selection = Selection::Unknown;
        self.inner
            .select_window(window.start_hour(), window.len())
            .await?;
        self.selection = wanted;
        Ok(())
    }

    /// Clears the selection. Until the page action succeeds the selection is
    /// unknown, so the next `ensure_window` clears again before selecting.
    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.selection = Selection::Unknown;
        self.inner.clear_selection().await?;
        self.selection = Selection::Clear;
        Ok(())
    }

    /// Dismisses prompts and clears the selection, logging instead of failing.
    pub async fn reset(&mut self) {
        for _ in 0..MAX_PROMPTS {
            if !self.inner.try_dismiss_prompt().await {
                break;
            }
        }
        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to clear live selection");
        }
    }

    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        self.selection = Selection::Unknown;
        self.inner.refresh().await?;
        self.selection = Selection::Clear;
        Ok(())
    }

    pub async fn wait_for_dates(&mut self, timeout: Duration) -> Result<(), SessionError> {
        self.inner.wait_for_dates(timeout).await
    }

    pub async fn select_latest_date(&mut self) -> Result<(), SessionError> {
        self.selection = Selection::Unknown;
        self.inner.select_latest_date().await?;
        self.selection = Selection::Clear;
        Ok(())
    }

    pub async fn read_courts(&mut self, courts: &[CourtId]) -> Result<Vec<CourtId>, SessionError> {
        self.inner.read_courts(courts).await
    }

    pub async fn select_court(&mut self, court: CourtId) -> Result<CourtSelection, SessionError> {
        self.inner.select_court(court).await
    }

    pub async fn captcha_image(&mut self, timeout: Duration) -> Result<Option<String>, SessionError> {
        self.inner.captcha_image(timeout).await
    }

    pub async fn refresh_captcha(&mut self) -> Result<(), SessionError> {
        self.inner.refresh_captcha().await
    }

    pub async fn try_dismiss_prompt(&mut self) -> bool {
        self.inner.try_dismiss_prompt().await
    }

    pub async fn cookies(&mut self) -> Result<Vec<SessionCookie>, SessionError> {
        self.inner.cookies().await
    }

    pub async fn user_agent(&mut self) -> Result<String, SessionError> {
        self.inner.user_agent().await
    }
}
