pub mod slack;

pub use slack::{ReportError, SlackNotifier, build_payload};
