use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum CaptchaError {
    #[error("ocr service error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ocr service returned no text")]
    Empty,
}

/// Reads the verification code off a challenge image.
///
/// Implementations return the raw recognized text; callers normalize it.
#[async_trait]
pub trait CaptchaSolver: Send + Sync + 'static {
    /// `image` is a base64-encoded PNG.
    async fn solve(&self, image: &str) -> Result<String, CaptchaError>;
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: Option<String>,
}

/// OCR over HTTP: `POST {"image": <base64>}` → `{"text": ".."}`.
#[derive(Clone)]
pub struct HttpOcrSolver {
    http: Client,
    url: String,
}

impl HttpOcrSolver {
    pub fn new(url: String, timeout: Duration) -> Result<Self, CaptchaError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl CaptchaSolver for HttpOcrSolver {
    #[instrument(skip_all, level = "debug")]
    async fn solve(&self, image: &str) -> Result<String, CaptchaError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&OcrRequest { image })
            .send()
            .await?
            .error_for_status()?;

        let body: OcrResponse = resp.json().await?;
        let text = body.text.filter(|t| !t.trim().is_empty()).ok_or(CaptchaError::Empty)?;

        debug!(raw = %text, "ocr result");
        Ok(text)
    }
}
