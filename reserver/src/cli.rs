use clap::{Parser, ValueEnum};

use reserver::config::{AppConfig, ProbeMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProbeModeCli {
    Speculative,
    Direct,
}

#[derive(Debug, Parser)]
#[clap(name = "reserver", version)]
pub struct Cli {
    /// Skip the opening wait and start searching right away
    #[clap(long)]
    pub now: bool,

    /// Overrides PROBE_MODE
    #[clap(long, value_enum)]
    pub probe_mode: Option<ProbeModeCli>,

    /// Overrides MAX_ATTEMPTS
    #[clap(long)]
    pub max_attempts: Option<u32>,

    /// JSON log lines regardless of APP_ENV
    #[clap(long)]
    pub json_logs: bool,
}

pub(crate) fn cli_to_probe_mode(p: ProbeModeCli) -> ProbeMode {
    match p {
        ProbeModeCli::Speculative => ProbeMode::Speculative,
        ProbeModeCli::Direct => ProbeMode::Direct,
    }
}

impl Cli {
    /// Applies command-line overrides on top of the environment config.
    pub(crate) fn apply(&self, cfg: &mut AppConfig) {
        if let Some(mode) = self.probe_mode {
            cfg.probe_mode = cli_to_probe_mode(mode);
        }
        if let Some(max) = self.max_attempts.filter(|m| *m > 0) {
            cfg.max_attempts = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["reserver", "--now", "--probe-mode", "direct", "--max-attempts", "7"]);
        assert!(cli.now);
        assert!(matches!(cli.probe_mode, Some(ProbeModeCli::Direct)));
        assert_eq!(cli.max_attempts, Some(7));
    }

    #[test]
    fn overrides_apply_on_top_of_env() {
        let mut cfg = AppConfig::from_lookup(|k| {
            let v = match k {
                "LOGIN_ID" => Some("player"),
                "LOGIN_PASSWORD" => Some("secret"),
                "LOGIN_URL" => Some("https://portal.example/sso/usr/login"),
                "BASE_URL" => Some("https://portal.example"),
                "OCR_URL" => Some("http://localhost:8000/ocr"),
                _ => None,
            };
            v.map(str::to_string)
        })
        .unwrap();

        Cli::parse_from(["reserver", "--probe-mode", "direct", "--max-attempts", "0"]).apply(&mut cfg);

        assert_eq!(cfg.probe_mode, ProbeMode::Direct);
        // zero is not a usable ceiling
        assert_eq!(cfg.max_attempts, 30);
    }
}
