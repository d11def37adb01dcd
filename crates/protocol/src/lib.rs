//! Wire types for slipcheck.
//!
//! This crate contains the serde-serializable types shared between the
//! browser automation runtime and the HTTP front end:
//!
//! * [`Cookie`] and [`CookieJar`]: the DevTools cookie shape and the
//!   `name=value; name=value` header form used for upstream calls.
//! * [`CheckResponse`], [`HealthResponse`] and [`ErrorBody`]: the JSON
//!   bodies returned by the HTTP endpoints.
//!
//! Types here are pure data. Behavior beyond serialization, header
//! encoding and URL matching lives in `slipcheck-runtime` and `slipcheck-cli`.

pub mod api;
pub mod cookie;

pub use api::*;
pub use cookie::*;
