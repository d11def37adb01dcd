//! Capability traits for the browser automation layer.
//!
//! These are the only seams the session manager depends on. A launcher
//! produces one long-lived [`BrowserAutomation`] bound to a profile directory;
//! pages are opened on it for renewals and closed afterwards while the browser
//! keeps running so its cookie store stays warm.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use slipcheck_protocol::CookieJar;
use url::Url;

use crate::error::Result;

/// Creates the process-wide automation session.
#[async_trait]
pub trait AutomationLauncher: Send + Sync {
	async fn launch(&self) -> Result<Arc<dyn BrowserAutomation>>;
}

/// A running browser with a persistent cookie store.
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
	/// Cookies the browser would send with a request to `url`, in browser order.
	async fn cookies(&self, url: &Url) -> Result<CookieJar>;

	/// Opens a fresh page in the persistent context.
	async fn new_page(&self) -> Result<Box<dyn AutomationPage>>;

	/// Profile directory backing the cookie store, `None` when running without one.
	fn profile_dir(&self) -> Option<&Path>;

	/// Shuts the browser down so the profile is flushed to disk.
	async fn close(&self) -> Result<()> {
		Ok(())
	}
}

/// A single page of the automation session.
#[async_trait]
pub trait AutomationPage: Send {
	/// Navigates and waits until the document is interactive.
	async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()>;

	/// Waits until every name in `names` is visible in `document.cookie`.
	///
	/// Returns [`AutomationError::Timeout`](crate::AutomationError::Timeout) when `timeout` expires.
	async fn wait_for_cookies(&mut self, names: &[String], timeout: Duration) -> Result<()>;

	async fn close(self: Box<Self>) -> Result<()>;
}
