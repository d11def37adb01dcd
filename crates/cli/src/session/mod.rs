//! Clearance session: status derivation, renewal and session-backed requests.

mod fetch;
mod keepalive;
mod manager;
mod status;

pub use fetch::FetchOptions;
pub use manager::{RenewalEpoch, RenewalReason, SessionManager};
pub use status::{ClearanceStatus, derive_status, now_ms};
