use std::time::Duration;

use chrono::Utc;
use common::LogCapture;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::model::ReservationResult;

/// Full log is attached on success only below this size.
const SUCCESS_LOG_LIMIT: usize = 3_000;
/// Failure reports carry the last this-many characters of the log.
const FAILURE_LOG_TAIL: usize = 2_500;
/// Attempt lines listed in a failure report.
const ATTEMPT_LINES: usize = 15;

const SUCCESS_COLOR: &str = "#2EB67D";
const FAILURE_COLOR: &str = "#E01E5A";
const LOG_COLOR: &str = "#36a64f";
const FOOTER: &str = "court reserver";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected the report: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// Builds the webhook body for `result`. `log` is the captured run log.
pub fn build_payload(result: &ReservationResult, log: &LogCapture, base_url: &str, ts: i64) -> Value {
    let mut attachments = Vec::with_capacity(2);

    if result.success {
        let court = match (result.court, result.court_kind()) {
            (Some(c), Some(kind)) => format!("{c} ({kind})"),
            _ => "-".to_string(),
        };
        let retries = result.retries();

        let mut text = format!(
            "*Date:* {}\n*Time:* {}\n*Court:* {}\n*Strategy:* {}",
            result.date.as_deref().unwrap_or("-"),
            result.time_slot.as_deref().unwrap_or("-"),
            court,
            result.strategy_name.as_deref().unwrap_or("-"),
        );
        if retries > 0 {
            text.push_str(&format!("\n*Retries:* {retries}"));
        }
        text.push_str(&format!("\n\n<{base_url}|Open the portal>"));

        attachments.push(json!({
            "title": "Court reserved",
            "title_link": base_url,
            "text": text,
            "color": SUCCESS_COLOR,
            "footer": FOOTER,
            "ts": ts,
        }));

        let full = log.contents();
        if !full.is_empty() && full.chars().count() < SUCCESS_LOG_LIMIT {
            attachments.push(json!({
                "title": "Run log",
                "text": format!("```{full}```"),
                "color": LOG_COLOR,
            }));
        }
    } else {
        let tried = if result.tried_strategies.is_empty() {
            "none".to_string()
        } else {
            result.tried_strategies.join(" → ")
        };

        let mut text = format!(
            "*Date:* {}\n*Tried strategies:* {}\n*Cause:* {}",
            result.date.as_deref().unwrap_or("failed before date selection"),
            tried,
            result.error_message.as_deref().unwrap_or("unknown"),
        );

        if !result.attempts.is_empty() {
            let skip = result.attempts.len().saturating_sub(ATTEMPT_LINES);
            let lines: Vec<String> = result.attempts[skip..].iter().map(|a| a.to_string()).collect();
            text.push_str(&format!(
                "\n*Attempts ({}):*\n```{}```",
                result.attempts.len(),
                lines.join("\n")
            ));
        }

        attachments.push(json!({
            "title": "Court reservation failed",
            "text": text,
            "color": FAILURE_COLOR,
            "footer": FOOTER,
            "ts": ts,
        }));

        let tail = log.tail(FAILURE_LOG_TAIL);
        if !tail.is_empty() {
            attachments.push(json!({
                "title": "Run log (latest)",
                "text": format!("```{tail}```"),
                "color": FAILURE_COLOR,
            }));
        }
    }

    json!({ "attachments": attachments })
}

/// Posts the run report to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    http: Client,
    webhook: Option<String>,
    base_url: String,
}

impl SlackNotifier {
    pub fn new(webhook: Option<String>, base_url: String) -> Result<Self, ReportError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            webhook,
            base_url,
        })
    }

    pub fn enabled(&self) -> bool {
        self.webhook.is_some()
    }

    #[instrument(skip_all, fields(success = result.success))]
    pub async fn send(&self, result: &ReservationResult, log: &LogCapture) -> Result<(), ReportError> {
        let Some(url) = self.webhook.as_deref() else {
            info!("slack webhook not configured, skipping report");
            return Ok(());
        };

        let payload = build_payload(result, log, &self.base_url, Utc::now().timestamp());
        let resp = self.http.post(url).json(&payload).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "slack report rejected");
            return Err(ReportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("slack report sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptOutcome, AttemptRecord, CourtId};

    fn record(seq: u32, court: u32, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            seq,
            strategy: "indoor".into(),
            window: "19:00~21:00".into(),
            court: CourtId(court),
            outcome,
            message: String::new(),
            elapsed_ms: 40,
        }
    }

    fn capture_with(lines: &[&str]) -> LogCapture {
        let c = LogCapture::new(1_000);
        for l in lines {
            c.push((*l).to_string());
        }
        c
    }

    #[test]
    fn success_report_lists_booking_and_short_log() {
        let result = ReservationResult {
            success: true,
            date: Some("2026-10-26".into()),
            time_slot: Some("19:00~21:00".into()),
            court: Some(CourtId(6)),
            strategy_name: Some("indoor".into()),
            tried_strategies: vec!["indoor".into()],
            attempts: vec![
                record(1, 5, AttemptOutcome::Conflict),
                record(2, 6, AttemptOutcome::Success),
            ],
            error_message: None,
        };
        let log = capture_with(&["started", "booked"]);

        let v = build_payload(&result, &log, "https://portal.example", 1_700_000_000);
        let atts = v["attachments"].as_array().unwrap();

        assert_eq!(atts.len(), 2);
        let text = atts[0]["text"].as_str().unwrap();
        assert!(text.contains("*Court:* 6 (indoor)"));
        assert!(text.contains("*Retries:* 1"));
        assert_eq!(atts[0]["color"], SUCCESS_COLOR);
        assert!(atts[1]["text"].as_str().unwrap().contains("booked"));
    }

    #[test]
    fn success_report_drops_long_log() {
        let result = ReservationResult {
            success: true,
            ..Default::default()
        };
        let long = "x".repeat(SUCCESS_LOG_LIMIT);
        let log = capture_with(&[&long]);

        let v = build_payload(&result, &log, "https://portal.example", 0);
        assert_eq!(v["attachments"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn failure_report_carries_cause_strategies_and_log_tail() {
        let mut result = ReservationResult {
            tried_strategies: vec!["indoor".into(), "outdoor".into()],
            attempts: vec![record(1, 5, AttemptOutcome::Conflict)],
            ..Default::default()
        };
        result.fail("court already reserved");

        let long = "y".repeat(4_000);
        let log = capture_with(&[&long]);

        let v = build_payload(&result, &log, "https://portal.example", 0);
        let atts = v["attachments"].as_array().unwrap();

        let text = atts[0]["text"].as_str().unwrap();
        assert!(text.contains("failed before date selection"));
        assert!(text.contains("indoor → outdoor"));
        assert!(text.contains("*Cause:* court already reserved"));
        assert!(text.contains("court 5 -> conflict"));

        let tail = atts[1]["text"].as_str().unwrap();
        assert!(tail.chars().count() <= FAILURE_LOG_TAIL + 6);
    }

    #[tokio::test]
    async fn missing_webhook_skips_sending() {
        let n = SlackNotifier::new(None, "https://portal.example".into()).unwrap();
        assert!(!n.enabled());
        n.send(&ReservationResult::default(), &LogCapture::new(10))
            .await
            .unwrap();
    }
}
