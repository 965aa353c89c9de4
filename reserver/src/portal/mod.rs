pub mod client;
pub mod errors;
pub mod types;

pub use client::{PortalApi, PortalClient, normalize_api_base};
pub use errors::PortalError;
pub use types::{BasketOutcome, BasketRequest, SessionCookie};
