use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("failed to read strategies file '{path}': {source}")]
    StrategiesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse strategies file: {0}")]
    StrategiesParse(#[from] serde_json::Error),

    #[error("invalid strategy '{name}': {reason}")]
    InvalidStrategy { name: String, reason: String },
}

/// Run-level failure taxonomy. Every variant ends the run with exit code 1
/// and a failure report.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Startup(#[from] ConfigError),

    #[error("gate failure: {0}")]
    Gate(String),

    #[error("opening sync failed: {0}")]
    Sync(String),

    #[error("no slots available: {0}")]
    NoSlots(String),

    /// Submission rejected in a way that must not be retried; the message is
    /// the server's, verbatim.
    #[error("{0}")]
    Terminal(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
