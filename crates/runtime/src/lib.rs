//! Browser automation runtime for slipcheck.
//!
//! The session layer talks to a browser only through the capability traits in
//! [`automation`]: launch a persistent profile, open a page, navigate, wait for
//! cookies and read the cookie jar for an origin. [`chrome`] implements them
//! for Chromium-family browsers over the DevTools protocol.

pub mod automation;
pub mod browser_finder;
pub mod cdp;
pub mod chrome;
pub mod error;
pub mod probe;
pub mod process;
pub mod profile;

pub use automation::{AutomationLauncher, AutomationPage, BrowserAutomation};
pub use chrome::{ChromeBrowser, ChromeLauncher, LaunchOptions};
pub use error::{AutomationError, Result};
pub use profile::{default_profile_dir, prepare_profile_dir};
