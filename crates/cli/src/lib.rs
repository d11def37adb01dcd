//! slipcheck: betting-slip lookups through a browser-derived clearance session.
//!
//! The [`session`] module owns the clearance lifecycle (lazy browser launch,
//! status derivation, deduplicated renewal, keepalive). [`check`] implements
//! the lookup-with-one-retry flow that both the HTTP API in [`server`] and the
//! `check` command use.

pub mod check;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod server;
pub mod session;
pub mod upstream;

pub use error::{Result, SlipError};
