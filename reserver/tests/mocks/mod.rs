#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use reserver::browser::{CourtSelection, LiveSession, SessionError};
use reserver::captcha::{CaptchaError, CaptchaSolver};
use reserver::model::{CourtId, ReservableDate, SlotState};
use reserver::portal::types::validity_message;
use reserver::portal::{BasketOutcome, BasketRequest, PortalApi, PortalError, SessionCookie};

pub fn date() -> ReservableDate {
    ReservableDate {
        day: "2026-10-26".into(),
        token: "tok-20261026".into(),
    }
}

/// One-hour slot starting at `hour` with `remaining` places left; a
/// non-positive `remaining` closes it.
pub fn slot(hour: u32, remaining: i64) -> SlotState {
    SlotState {
        start: format!("{hour:02}:00"),
        end: format!("{:02}:00", hour + 1),
        total: 4,
        ended: 4 - remaining.max(0),
        in_progress: 0,
        others: 0,
        open: remaining > 0,
    }
}

pub fn rejected(code: i64) -> BasketOutcome {
    BasketOutcome::Rejected {
        code,
        message: validity_message(code).unwrap_or("unknown").to_string(),
    }
}

// -----------------------
// Portal
// -----------------------

pub struct MockPortal {
    pub dates: Vec<ReservableDate>,
    pub slots: Vec<SlotState>,
    /// Per-court listings for the direct probe; missing courts see `slots`.
    pub per_court: HashMap<CourtId, Vec<SlotState>>,
    /// Scripted basket answers, consumed in order, then `fallback`.
    pub script: Mutex<VecDeque<BasketOutcome>>,
    pub fallback: BasketOutcome,
    pub submitted: Mutex<Vec<BasketRequest>>,
    /// Slot listings answer with an expired-session envelope.
    pub reject_session: bool,

    pub calendar_calls: AtomicUsize,
    pub time_list_calls: AtomicUsize,
    pub basket_calls: AtomicUsize,
}

impl MockPortal {
    pub fn new(slots: Vec<SlotState>) -> Self {
        Self {
            dates: vec![
                ReservableDate {
                    day: "2026-10-25".into(),
                    token: "tok-20261025".into(),
                },
                date(),
            ],
            slots,
            per_court: HashMap::new(),
            script: Mutex::new(VecDeque::new()),
            fallback: BasketOutcome::Inserted,
            submitted: Mutex::new(Vec::new()),
            reject_session: false,
            calendar_calls: AtomicUsize::new(0),
            time_list_calls: AtomicUsize::new(0),
            basket_calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(mut self, script: Vec<BasketOutcome>, fallback: BasketOutcome) -> Self {
        self.script = Mutex::new(script.into());
        self.fallback = fallback;
        self
    }

    pub fn with_court(mut self, court: u32, slots: Vec<SlotState>) -> Self {
        self.per_court.insert(CourtId(court), slots);
        self
    }

    /// (court, first start time, captcha) of every submission, in order.
    pub fn submissions(&self) -> Vec<(u32, String, String)> {
        self.submitted
            .lock()
            .iter()
            .map(|r| {
                let res = &r.reservations[0];
                (
                    res.court_no.parse().unwrap_or_default(),
                    res.start_t_array.first().cloned().unwrap_or_default(),
                    r.captcha.clone(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl PortalApi for MockPortal {
    async fn calendar(&self, _search_date: &str) -> Result<Vec<ReservableDate>, PortalError> {
        self.calendar_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.dates.clone())
    }

    async fn time_list(
        &self,
        _date: &ReservableDate,
        court: Option<CourtId>,
    ) -> Result<Vec<SlotState>, PortalError> {
        self.time_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_session {
            return Err(PortalError::SessionRejected {
                endpoint: "tennis_mtime_list.do",
                ss_check: -1,
            });
        }
        let listing = court
            .and_then(|c| self.per_court.get(&c))
            .unwrap_or(&self.slots);
        Ok(listing.clone())
    }

    async fn add_to_basket(&self, request: &BasketRequest) -> Result<BasketOutcome, PortalError> {
        self.basket_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

// -----------------------
// Live session
// -----------------------

#[derive(Default)]
pub struct MockSession {
    /// Courts whose markers read free; `None` means every court.
    pub free: Option<Vec<CourtId>>,
    /// Courts the page refuses with a prompt.
    pub refused: HashSet<CourtId>,
    pub no_image: bool,

    pub prompt_open: bool,
    pub selected_courts: Vec<CourtId>,
    pub windows: Vec<(u32, usize)>,

    pub date_selections: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub captcha_refreshes: AtomicUsize,
    pub dismissed: AtomicUsize,
}

#[async_trait]
impl LiveSession for MockSession {
    async fn refresh(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn wait_for_dates(&mut self, _timeout: Duration) -> Result<(), SessionError> {
        Ok(())
    }

    async fn select_latest_date(&mut self) -> Result<(), SessionError> {
        self.date_selections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn select_window(&mut self, start_hour: u32, slot_count: usize) -> Result<(), SessionError> {
        self.windows.push((start_hour, slot_count));
        Ok(())
    }

    async fn clear_selection(&mut self) -> Result<(), SessionError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_courts(&mut self, courts: &[CourtId]) -> Result<Vec<CourtId>, SessionError> {
        Ok(courts
            .iter()
            .copied()
            .filter(|c| self.free.as_ref().is_none_or(|f| f.contains(c)))
            .collect())
    }

    async fn select_court(&mut self, court: CourtId) -> Result<CourtSelection, SessionError> {
        self.selected_courts.push(court);
        if self.refused.contains(&court) {
            self.prompt_open = true;
            return Ok(CourtSelection::Unavailable("예약이 완료된 코트입니다".into()));
        }
        Ok(CourtSelection::Selected)
    }

    async fn captcha_image(&mut self, _timeout: Duration) -> Result<Option<String>, SessionError> {
        Ok((!self.no_image).then(|| "aW1hZ2U=".to_string()))
    }

    async fn refresh_captcha(&mut self) -> Result<(), SessionError> {
        self.captcha_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn try_dismiss_prompt(&mut self) -> bool {
        if self.prompt_open {
            self.prompt_open = false;
            self.dismissed.fetch_add(1, Ordering::SeqCst);
            return true;
        }
        false
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, SessionError> {
        Ok(vec![])
    }

    async fn user_agent(&mut self) -> Result<String, SessionError> {
        Ok("mock-agent".into())
    }
}

// -----------------------
// OCR
// -----------------------

pub struct MockSolver {
    /// Raw reads, consumed in order, then `fallback`. `None` is an OCR failure.
    pub reads: Mutex<VecDeque<Option<String>>>,
    pub fallback: String,
    pub calls: AtomicUsize,
}

impl MockSolver {
    pub fn reading(code: &str) -> Self {
        Self::scripted(vec![], code)
    }

    pub fn scripted(reads: Vec<Option<&str>>, fallback: &str) -> Self {
        Self {
            reads: Mutex::new(reads.into_iter().map(|r| r.map(str::to_string)).collect()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptchaSolver for MockSolver {
    async fn solve(&self, _image: &str) -> Result<String, CaptchaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reads.lock().pop_front() {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(CaptchaError::Empty),
            None => Ok(self.fallback.clone()),
        }
    }
}
