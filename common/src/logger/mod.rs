//! Tracing setup shared by the workspace binaries.
//!
//! Besides the usual stdout subscriber, a [`LogCapture`] layer keeps the
//! formatted run log in memory so it can be attached to the end-of-run report.

mod capture;
mod init;
mod spans;
mod trace_id;

pub use capture::LogCapture;
pub use init::init_tracing;
pub use spans::{annotate_span, child_span, root_span, warn_if_slow};
pub use trace_id::TraceId;
