use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use crate::model::{CourtId, ReservableDate, SlotState};
use crate::portal::errors::PortalError;
use crate::portal::types::{
    BasketOutcome, BasketRequest, BasketResponse, CalendarEnvelope, SessionCookie,
    TimeListEnvelope,
};

const API_SUFFIX: &str = "/online/tennis";
const CALENDAR: &str = "tennis_mcalendar_list.do";
const TIME_LIST: &str = "tennis_mtime_list.do";
const BASKET_INSERT: &str = "tennis_basket_ins.do";

/// Data endpoints of the reservation portal. Implemented over HTTP by
/// [`PortalClient`]; mocked in tests.
#[async_trait]
pub trait PortalApi: Send + Sync + 'static {
    /// Reservable dates, in listing order. `search_date` is "YYYYMMDD".
    async fn calendar(&self, search_date: &str) -> Result<Vec<ReservableDate>, PortalError>;

    /// Slot counters for `date`. With `court`, the counters are restricted to
    /// that single court.
    async fn time_list(
        &self,
        date: &ReservableDate,
        court: Option<CourtId>,
    ) -> Result<Vec<SlotState>, PortalError>;

    /// Transport errors are `Err`; every answer the portal gives, including
    /// ones it cannot parse, is an `Ok` outcome.
    async fn add_to_basket(&self, request: &BasketRequest) -> Result<BasketOutcome, PortalError>;
}

/// `BASE_URL` → API base ending in `/online/tennis`.
pub fn normalize_api_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    match trimmed.find(API_SUFFIX) {
        Some(idx) => format!("{}{}", &trimmed[..idx], API_SUFFIX),
        None => format!("{trimmed}{API_SUFFIX}"),
    }
}

#[derive(Clone)]
pub struct PortalClient {
    http: Client,
    api_base: String,
}

impl PortalClient {
    /// Builds a client that shares the browser's authenticated session.
    pub fn new(
        base_url: &str,
        cookies: &[SessionCookie],
        user_agent: &str,
    ) -> Result<Self, PortalError> {
        let api_base = normalize_api_base(base_url);
        let origin =
            Url::parse(&api_base).map_err(|e| PortalError::InvalidUrl(format!("{api_base}: {e}")))?;

        let jar = Arc::new(Jar::default());
        for c in cookies {
            let path = c.path.as_deref().unwrap_or("/");
            jar.add_cookie_str(&format!("{}={}; Path={}", c.name, c.value, path), &origin);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(referer) = HeaderValue::from_str(base_url) {
            headers.insert(REFERER, referer);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_provider(jar)
            .build()?;

        info!(cookies = cookies.len(), api_base = %api_base, "portal client ready");

        Ok(Self { http, api_base })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base, endpoint)
    }
}

#[async_trait]
impl PortalApi for PortalClient {
    #[instrument(skip(self), level = "debug")]
    async fn calendar(&self, search_date: &str) -> Result<Vec<ReservableDate>, PortalError> {
        let resp = self
            .http
            .get(self.url(CALENDAR))
            .timeout(Duration::from_secs(10))
            .query(&[
                ("search_gubun", "date"),
                ("search_date", search_date),
                ("court_no", "0"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: CalendarEnvelope = resp.json().await?;
        if envelope.ss_check <= 0 {
            return Err(PortalError::SessionRejected {
                endpoint: CALENDAR,
                ss_check: envelope.ss_check,
            });
        }

        let dates: Vec<ReservableDate> = envelope
            .calendar_list
            .iter()
            .filter(|d| d.is_reservable())
            .map(ReservableDate::from)
            .collect();

        debug!(
            listed = envelope.calendar_list.len(),
            reservable = dates.len(),
            "calendar fetched"
        );

        Ok(dates)
    }

    #[instrument(skip(self), fields(day = %date.day, court = ?court.map(|c| c.0)), level = "debug")]
    async fn time_list(
        &self,
        date: &ReservableDate,
        court: Option<CourtId>,
    ) -> Result<Vec<SlotState>, PortalError> {
        let compact = date.compact();
        let mut params: Vec<(&str, String)> = vec![
            ("search_date", compact),
            ("search_gubun", "date".to_string()),
            ("search_xdate", date.token.clone()),
        ];
        if let Some(c) = court {
            params.push(("court_no", c.to_string()));
        }

        let resp = self
            .http
            .get(self.url(TIME_LIST))
            .timeout(Duration::from_secs(10))
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let envelope: TimeListEnvelope = resp.json().await?;
        if envelope.ss_check <= 0 {
            return Err(PortalError::SessionRejected {
                endpoint: TIME_LIST,
                ss_check: envelope.ss_check,
            });
        }

        let slots: Vec<SlotState> = envelope.time_list.iter().map(SlotState::from).collect();

        debug!(
            slots = slots.len(),
            bookable = slots.iter().filter(|s| s.is_bookable()).count(),
            "time list fetched"
        );

        Ok(slots)
    }

    #[instrument(
        skip(self, request),
        fields(
            court = request.reservations.first().map(|r| r.court_no.as_str()).unwrap_or(""),
            day = %request.search_date_a
        )
    )]
    async fn add_to_basket(&self, request: &BasketRequest) -> Result<BasketOutcome, PortalError> {
        let resp = self
            .http
            .post(self.url(BASKET_INSERT))
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let body = resp.text().await?;

        let outcome = match serde_json::from_str::<BasketResponse>(&body) {
            Ok(parsed) => {
                debug!(
                    ss_check = parsed.ss_check,
                    validity_no = parsed.validity_no,
                    "basket response"
                );
                match parsed.outcome() {
                    BasketOutcome::Unexpected(_) => BasketOutcome::Unexpected(body),
                    other => other,
                }
            }
            Err(e) => {
                warn!(error = %e, "basket response not understood");
                BasketOutcome::Unexpected(body)
            }
        };

        Ok(outcome)
    }
}
