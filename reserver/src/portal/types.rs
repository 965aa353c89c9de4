use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{CourtId, ReservableDate, SlotState, TimeWindow};

/// Cookie copied out of the authenticated browser session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarEnvelope {
    #[serde(default, deserialize_with = "lenient_count")]
    pub ss_check: i64,
    #[serde(default)]
    pub calendar_list: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarDay {
    #[serde(rename = "dDay")]
    pub d_day: String,
    #[serde(rename = "xDay", default)]
    pub x_day: String,
    #[serde(rename = "checkDay", default)]
    pub check_day: String,
}

impl CalendarDay {
    pub fn is_reservable(&self) -> bool {
        self.check_day == "Y"
    }
}

impl From<&CalendarDay> for ReservableDate {
    fn from(d: &CalendarDay) -> Self {
        ReservableDate {
            day: d.d_day.clone(),
            token: d.x_day.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimeListEnvelope {
    #[serde(default, deserialize_with = "lenient_count")]
    pub ss_check: i64,
    #[serde(default)]
    pub time_list: Vec<TimeEntry>,
}

/// Per-hour capacity counters. The portal sends the counters as numbers or
/// as numeric strings depending on the endpoint revision.
#[derive(Debug, Deserialize)]
pub struct TimeEntry {
    #[serde(rename = "startT", default)]
    pub start_t: String,
    #[serde(rename = "endT", default)]
    pub end_t: String,
    #[serde(rename = "totCnt", default, deserialize_with = "lenient_count")]
    pub tot_cnt: i64,
    #[serde(rename = "endCnt", default, deserialize_with = "lenient_count")]
    pub end_cnt: i64,
    #[serde(rename = "progCnt", default, deserialize_with = "lenient_count")]
    pub prog_cnt: i64,
    #[serde(rename = "othersCnt", default, deserialize_with = "lenient_count")]
    pub others_cnt: i64,
    #[serde(rename = "useYn", default)]
    pub use_yn: Option<String>,
}

impl From<&TimeEntry> for SlotState {
    fn from(t: &TimeEntry) -> Self {
        SlotState {
            start: t.start_t.clone(),
            end: t.end_t.clone(),
            total: t.tot_cnt,
            ended: t.end_cnt,
            in_progress: t.prog_cnt,
            others: t.others_cnt,
            open: t.use_yn.as_deref() != Some("N"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketRequest {
    /// Opaque per-date token.
    pub search_date: String,
    /// Plain "YYYYMMDD".
    pub search_date_a: String,
    pub captcha: String,
    pub reservations: Vec<BasketReservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketReservation {
    pub court_no: String,
    pub start_t_array: Vec<String>,
    pub end_t_array: Vec<String>,
}

impl BasketRequest {
    pub fn new(date: &ReservableDate, window: &TimeWindow, court: CourtId, code: &str) -> Self {
        Self {
            search_date: date.token.clone(),
            search_date_a: date.compact(),
            captcha: code.to_string(),
            reservations: vec![BasketReservation {
                court_no: court.to_string(),
                start_t_array: window.start_times(),
                end_t_array: window.end_times(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BasketResponse {
    #[serde(default, deserialize_with = "lenient_count")]
    pub ss_check: i64,
    #[serde(default = "missing_code", deserialize_with = "lenient_count")]
    pub validity_no: i64,
    #[serde(default, alias = "message", alias = "result_msg")]
    pub msg: Option<String>,
}

fn missing_code() -> i64 {
    -1
}

/// Basket insertion result after applying the portal's code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasketOutcome {
    /// Accepted into the pending-payment basket.
    Inserted,
    /// `validity_no > 0`; `message` is the mapped user-facing text.
    Rejected { code: i64, message: String },
    /// The verification code was wrong or unreadable.
    VerificationRejected(String),
    /// `ss_check == 0`
    TransferFailed,
    /// `ss_check == -1`
    LoginRequired,
    /// Anything the table does not cover; carries the raw body.
    Unexpected(String),
}

/// `validity_no` → message. Codes 2, 3 and 4 share one message in the
/// portal's own table and are kept that way.
pub fn validity_message(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("already in the pending-payment basket"),
        2..=4 => Some("exceeds the allowed 2-hour reservation window"),
        5 | 9 => Some("another user is booking this court"),
        6 => Some("court already reserved"),
        7 => Some("outside the reservation period"),
        8 => Some("settlement blackout (23:50~00:10)"),
        _ => None,
    }
}

fn is_verification_message(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("captcha") || msg.contains("자동입력")
}

impl BasketResponse {
    pub fn outcome(&self) -> BasketOutcome {
        if let Some(m) = self.msg.as_deref()
            && is_verification_message(m)
        {
            return BasketOutcome::VerificationRejected(m.to_string());
        }

        match (self.ss_check, self.validity_no) {
            (ss, 0) if ss > 0 => BasketOutcome::Inserted,
            (ss, code) if ss > 0 && code > 0 => BasketOutcome::Rejected {
                code,
                message: validity_message(code)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("unknown error (code: {code})")),
            },
            (0, _) => BasketOutcome::TransferFailed,
            (-1, _) => BasketOutcome::LoginRequired,
            (ss, code) => BasketOutcome::Unexpected(format!(
                "unexpected response: ss_check={ss}, validity_no={code}"
            )),
        }
    }
}

fn lenient_count<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("counter out of range: {n}"))),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("non-numeric counter: {s}"))),
        serde_json::Value::Null => Ok(0),
        other => Err(D::Error::custom(format!("unexpected counter: {other}"))),
    }
}
