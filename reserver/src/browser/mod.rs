pub mod gate;
pub mod page;
pub mod session;
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

use crate::model::CourtId;
use crate::portal::SessionCookie;

pub use gate::{GateSettings, pass_gate};
pub use page::PortalPage;
pub use session::{SessionError, SessionHandle};
pub use webdriver::{WebDriver, WebDriverError};

/// Result of clicking a court in the live session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CourtSelection {
    Selected,
    /// The page refused the court; carries the prompt text.
    Unavailable(String),
}

/// The authenticated browser page the reservation is driven through.
///
/// Window selection state is owned by [`SessionHandle`]; implementations
/// only perform the page actions.
#[async_trait]
pub trait LiveSession: Send {
    /// Reloads the reservation page.
    async fn refresh(&mut self) -> Result<(), SessionError>;

    /// Waits until the reservable-date links are rendered.
    async fn wait_for_dates(&mut self, timeout: Duration) -> Result<(), SessionError>;

    /// Clicks the last reservable date and waits for its time slots.
    async fn select_latest_date(&mut self) -> Result<(), SessionError>;

    /// Checks the slots `start_hour..start_hour + slot_count`.
    async fn select_window(&mut self, start_hour: u32, slot_count: usize)
    -> Result<(), SessionError>;

    /// Unchecks every selected slot.
    async fn clear_selection(&mut self) -> Result<(), SessionError>;

    /// Courts among `courts` whose marker does not read "no reservation"
    /// for the current selection, in the given order.
    async fn read_courts(&mut self, courts: &[CourtId]) -> Result<Vec<CourtId>, SessionError>;

    async fn select_court(&mut self, court: CourtId) -> Result<CourtSelection, SessionError>;

    /// Base64 PNG of the challenge image; `None` if it did not render within
    /// `timeout`.
    async fn captcha_image(&mut self, timeout: Duration) -> Result<Option<String>, SessionError>;

    async fn refresh_captcha(&mut self) -> Result<(), SessionError>;

    /// Accepts an open prompt. Returns whether one was open.
    async fn try_dismiss_prompt(&mut self) -> bool;

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, SessionError>;

    async fn user_agent(&mut self) -> Result<String, SessionError>;
}
