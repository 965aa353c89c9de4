//! Minimal W3C WebDriver client.
//!
//! Talks to an already running driver (chromedriver or compatible) over its
//! HTTP protocol. Only the commands the portal session needs are exposed.

use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::portal::SessionCookie;

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4a4d3a56ac26";

#[derive(Error, Debug)]
pub enum WebDriverError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error payload returned by the driver, e.g. `no such alert`.
    #[error("{error}: {message}")]
    Command { error: String, message: String },

    #[error("unexpected driver response: {0}")]
    Protocol(String),
}

impl WebDriverError {
    pub fn is_no_such_alert(&self) -> bool {
        matches!(self, WebDriverError::Command { error, .. } if error == "no such alert")
    }
}

/// Element handle returned by the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    pub(crate) fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    fn from_json(v: &Value) -> Option<Self> {
        v.get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
    }
}

/// Element lookup strategies.
#[derive(Clone, Copy, Debug)]
pub enum By<'a> {
    Css(&'a str),
    XPath(&'a str),
    LinkText(&'a str),
}

impl By<'_> {
    fn to_json(self) -> Value {
        let (using, value) = match self {
            By::Css(v) => ("css selector", v),
            By::XPath(v) => ("xpath", v),
            By::LinkText(v) => ("link text", v),
        };
        json!({ "using": using, "value": value })
    }
}

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: String,
}

pub struct WebDriver {
    http: Client,
    base: String,
    session_id: String,
}

impl WebDriver {
    /// Opens a new browser session.
    #[instrument(skip_all, fields(url = %url, headless))]
    pub async fn start(url: &str, headless: bool) -> Result<Self, WebDriverError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let base = url.trim_end_matches('/').to_string();

        let mut args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--window-size=1920,1080",
            "--lang=ko-KR",
        ];
        if headless {
            args.push("--headless=new");
        }

        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let value = send(&http, Method::POST, &format!("{base}/session"), Some(caps)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Protocol(format!("no sessionId in {value}")))?
            .to_string();

        info!(session_id = %session_id, "webdriver session started");

        Ok(Self {
            http,
            base,
            session_id,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        send(&self.http, method, &url, body).await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    pub async fn current_url(&self) -> Result<String, WebDriverError> {
        let v = self.command(Method::GET, "/url", None).await?;
        as_string(v)
    }

    pub async fn refresh(&self) -> Result<(), WebDriverError> {
        self.command(Method::POST, "/refresh", Some(json!({})))
            .await
            .map(|_| ())
    }

    pub async fn find_elements(&self, by: By<'_>) -> Result<Vec<ElementRef>, WebDriverError> {
        let v = self.command(Method::POST, "/elements", Some(by.to_json())).await?;
        elements(v)
    }

    pub async fn find_elements_in(
        &self,
        parent: &ElementRef,
        by: By<'_>,
    ) -> Result<Vec<ElementRef>, WebDriverError> {
        let path = format!("/element/{}/elements", parent.0);
        let v = self.command(Method::POST, &path, Some(by.to_json())).await?;
        elements(v)
    }

    pub async fn first(&self, by: By<'_>) -> Result<Option<ElementRef>, WebDriverError> {
        Ok(self.find_elements(by).await?.into_iter().next())
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Script click; avoids interception by overlays the portal layers on top.
    pub async fn click(&self, el: &ElementRef) -> Result<(), WebDriverError> {
        self.execute("arguments[0].click();", vec![el.to_json()])
            .await
            .map(|_| ())
    }

    pub async fn send_keys(&self, el: &ElementRef, text: &str) -> Result<(), WebDriverError> {
        let path = format!("/element/{}/value", el.0);
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    pub async fn attribute(
        &self,
        el: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let path = format!("/element/{}/attribute/{}", el.0, name);
        let v = self.command(Method::GET, &path, None).await?;
        Ok(v.as_str().map(str::to_string))
    }

    pub async fn is_selected(&self, el: &ElementRef) -> Result<bool, WebDriverError> {
        let path = format!("/element/{}/selected", el.0);
        let v = self.command(Method::GET, &path, None).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    /// Base64-encoded PNG of the element.
    pub async fn element_screenshot(&self, el: &ElementRef) -> Result<String, WebDriverError> {
        let path = format!("/element/{}/screenshot", el.0);
        let v = self.command(Method::GET, &path, None).await?;
        as_string(v)
    }

    /// `None` when no prompt is open.
    pub async fn alert_text(&self) -> Result<Option<String>, WebDriverError> {
        match self.command(Method::GET, "/alert/text", None).await {
            Ok(v) => Ok(Some(v.as_str().unwrap_or_default().to_string())),
            Err(e) if e.is_no_such_alert() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn accept_alert(&self) -> Result<(), WebDriverError> {
        self.command(Method::POST, "/alert/accept", Some(json!({})))
            .await
            .map(|_| ())
    }

    pub async fn cookies(&self) -> Result<Vec<SessionCookie>, WebDriverError> {
        let v = self.command(Method::GET, "/cookie", None).await?;
        serde_json::from_value(v).map_err(|e| WebDriverError::Protocol(e.to_string()))
    }

    pub async fn quit(&self) -> Result<(), WebDriverError> {
        self.command(Method::DELETE, "", None).await.map(|_| ())
    }
}

async fn send(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, WebDriverError> {
    let mut req = http.request(method.clone(), url);
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = req.send().await?;
    let status = resp.status();
    let envelope: Envelope = resp.json().await?;

    if !status.is_success() {
        let err: ErrorBody = serde_json::from_value(envelope.value)
            .map_err(|e| WebDriverError::Protocol(format!("{status}: {e}")))?;
        debug!(%method, url, error = %err.error, "webdriver command failed");
        return Err(WebDriverError::Command {
            error: err.error,
            message: err.message,
        });
    }

    Ok(envelope.value)
}

fn elements(v: Value) -> Result<Vec<ElementRef>, WebDriverError> {
    match v {
        Value::Array(items) => Ok(items.iter().filter_map(ElementRef::from_json).collect()),
        other => Err(WebDriverError::Protocol(format!("expected element list, got {other}"))),
    }
}

fn as_string(v: Value) -> Result<String, WebDriverError> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(WebDriverError::Protocol(format!("expected string, got {other}"))),
    }
}
