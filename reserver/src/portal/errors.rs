use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid portal url: {0}")]
    InvalidUrl(String),

    #[error("{endpoint} rejected the session (ss_check={ss_check})")]
    SessionRejected { endpoint: &'static str, ss_check: i64 },
}
