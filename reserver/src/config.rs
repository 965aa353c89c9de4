use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{ALL_COURTS, INDOOR_COURTS, OUTDOOR_COURTS, ReservationStrategy};

/// How the availability prober discovers free courts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMode {
    /// Select the window in the live session and read the court markers.
    Speculative,
    /// Per-court slot listing calls; never touches the live session.
    Direct,
}

impl FromStr for ProbeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speculative" | "ui" => Ok(ProbeMode::Speculative),
            "direct" | "api" => Ok(ProbeMode::Direct),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Account / portal
    // =========================
    pub login_id: String,
    pub login_password: String,
    /// SSO login page.
    pub login_url: String,
    /// Portal base URL; the data endpoints hang off `<base>/online/tennis`.
    pub base_url: String,

    // =========================
    // Collaborators
    // =========================
    /// Slack incoming webhook. Reporting is skipped when unset.
    pub slack_url: Option<String>,
    /// OCR service used to read the verification image.
    pub ocr_url: String,
    /// Running WebDriver endpoint (chromedriver or compatible).
    pub webdriver_url: String,
    pub headless: bool,

    // =========================
    // Opening instant
    // =========================
    /// Daily opening time, portal local time (KST).
    pub open_hour: u32,
    pub open_minute: u32,
    /// Added on top of the opening instant so the refresh never lands early.
    pub open_margin: Duration,
    /// Align the local clock to the portal's `Date` header before waiting.
    pub sync_server_clock: bool,

    // =========================
    // Search / retry budget
    // =========================
    /// Hard ceiling on candidate attempts across the whole run.
    ///
    /// Guarantees termination when the server keeps answering with
    /// contention codes.
    pub max_attempts: u32,
    /// Verification tries per candidate before giving up on it.
    pub captcha_attempts: u32,
    pub probe_mode: ProbeMode,
    /// Strategies in priority order.
    pub strategies: Vec<ReservationStrategy>,

    // =========================
    // Bounded waits
    // =========================
    pub login_timeout: Duration,
    pub queue_timeout: Duration,
    pub dates_timeout: Duration,
    pub captcha_timeout: Duration,

    /// JSON log lines (production) instead of pretty output.
    pub json_logs: bool,
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_CAPTCHA_ATTEMPTS: u32 = 3;

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Required values
    /// are validated eagerly.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let required = |k: &'static str| get(k).ok_or(ConfigError::Missing(k));

        let login_id = required("LOGIN_ID")?;
        let login_password = required("LOGIN_PASSWORD")?;
        let login_url = required("LOGIN_URL")?;
        let base_url = required("BASE_URL")?;
        let ocr_url = required("OCR_URL")?;

        let open_hour: u32 = parse_or(&get, "OPEN_HOUR", 9)?;
        if open_hour > 23 {
            return Err(invalid("OPEN_HOUR", open_hour));
        }
        let open_minute: u32 = parse_or(&get, "OPEN_MINUTE", 0)?;
        if open_minute > 59 {
            return Err(invalid("OPEN_MINUTE", open_minute));
        }

        let max_attempts: u32 = parse_or(&get, "MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(invalid("MAX_ATTEMPTS", max_attempts));
        }
        let captcha_attempts: u32 =
            parse_or(&get, "CAPTCHA_ATTEMPTS", DEFAULT_CAPTCHA_ATTEMPTS)?;
        if captcha_attempts == 0 {
            return Err(invalid("CAPTCHA_ATTEMPTS", captcha_attempts));
        }

        let probe_mode = match get("PROBE_MODE") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PROBE_MODE", value: v })?,
            None => ProbeMode::Speculative,
        };

        let strategies = match get("STRATEGIES_FILE") {
            Some(path) => load_strategies(Path::new(&path))?,
            None => default_strategies(),
        };

        Ok(Self {
            login_id,
            login_password,
            login_url,
            base_url,
            slack_url: get("SLACK_URL"),
            ocr_url,
            webdriver_url: get("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            headless: parse_flag(&get, "HEADLESS", true)?,
            open_hour,
            open_minute,
            open_margin: Duration::from_millis(parse_or(&get, "OPEN_MARGIN_MS", 100u64)?),
            sync_server_clock: parse_flag(&get, "SYNC_SERVER_CLOCK", false)?,
            max_attempts,
            captcha_attempts,
            probe_mode,
            strategies,
            login_timeout: Duration::from_secs(30),
            queue_timeout: Duration::from_secs(120),
            dates_timeout: Duration::from_secs(30),
            captcha_timeout: Duration::from_secs(10),
            json_logs: get("APP_ENV").is_some_and(|v| v == "production"),
        })
    }
}

/// Indoor at 19 → outdoor at 20 → anything, as late as possible.
pub fn default_strategies() -> Vec<ReservationStrategy> {
    vec![
        ReservationStrategy::fixed("indoor 19-21", 19, 2, &INDOOR_COURTS),
        ReservationStrategy::fixed("outdoor 20-22", 20, 2, &OUTDOOR_COURTS),
        ReservationStrategy::latest("any court, latest", 2, &ALL_COURTS),
    ]
}

#[derive(Debug, Deserialize)]
struct StrategySpec {
    name: String,
    /// -1 (or absent with `auto_find_latest`) means "latest feasible".
    #[serde(default)]
    target_hour: Option<i32>,
    #[serde(alias = "time_slot_count")]
    slot_count: usize,
    preferred_courts: Vec<u32>,
    #[serde(default)]
    auto_find_latest: bool,
}

impl TryFrom<StrategySpec> for ReservationStrategy {
    type Error = ConfigError;

    fn try_from(s: StrategySpec) -> Result<Self, Self::Error> {
        let bad = |reason: &str| ConfigError::InvalidStrategy {
            name: s.name.clone(),
            reason: reason.to_string(),
        };

        if s.slot_count == 0 {
            return Err(bad("slot_count must be at least 1"));
        }
        if s.preferred_courts.is_empty() {
            return Err(bad("preferred_courts must not be empty"));
        }

        match (s.auto_find_latest, s.target_hour) {
            (true, _) | (false, Some(-1)) => Ok(ReservationStrategy::latest(
                s.name.clone(),
                s.slot_count,
                &s.preferred_courts,
            )),
            (false, Some(h)) if (0..24).contains(&h) => Ok(ReservationStrategy::fixed(
                s.name.clone(),
                h as u32,
                s.slot_count,
                &s.preferred_courts,
            )),
            (false, Some(_)) => Err(bad("target_hour must be in 0..=23 or -1")),
            (false, None) => Err(bad("target_hour is required unless auto_find_latest")),
        }
    }
}

pub fn parse_strategies(json: &str) -> Result<Vec<ReservationStrategy>, ConfigError> {
    let specs: Vec<StrategySpec> = serde_json::from_str(json)?;
    if specs.is_empty() {
        return Err(ConfigError::InvalidStrategy {
            name: "<list>".into(),
            reason: "at least one strategy is required".into(),
        });
    }
    specs.into_iter().map(ReservationStrategy::try_from).collect()
}

fn load_strategies(path: &Path) -> Result<Vec<ReservationStrategy>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::StrategiesIo {
        path: path.display().to_string(),
        source,
    })?;
    parse_strategies(&raw)
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

fn parse_flag<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
        None => Ok(default),
    }
}
