//! Automation error types.

use thiserror::Error;

/// Errors raised while launching or driving the browser.
#[derive(Debug, Error)]
pub enum AutomationError {
	/// No Chromium-family executable was found.
	#[error("Could not find a Chrome/Chromium executable. Install Chrome or set CHROME_PATH")]
	BrowserNotFound,

	/// The browser process could not be started or exited early.
	#[error("Failed to launch browser: {0}")]
	Launch(String),

	/// The DevTools HTTP endpoint did not answer.
	#[error("DevTools endpoint unavailable: {0}")]
	Endpoint(String),

	/// The DevTools websocket could not be opened or broke.
	#[error("DevTools connection failed: {0}")]
	Connection(String),

	/// DevTools answered a command with an error.
	#[error("DevTools error: {message} (code: {code})")]
	Protocol { code: i64, message: String },

	#[error("Navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("JavaScript error: {0}")]
	JavaScript(String),

	/// A bounded wait expired.
	#[error("Timed out after {ms}ms waiting for {condition}")]
	Timeout { ms: u64, condition: String },

	/// The websocket closed while a command was outstanding.
	#[error("DevTools session closed")]
	SessionClosed,

	#[error("Invalid DevTools response: {0}")]
	InvalidResponse(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl AutomationError {
	/// Returns `true` for expired bounded waits.
	pub fn is_timeout(&self) -> bool {
		matches!(self, AutomationError::Timeout { .. })
	}

	/// Returns `true` when the DevTools connection is gone and the browser must be relaunched.
	pub fn is_disconnected(&self) -> bool {
		matches!(self, AutomationError::SessionClosed | AutomationError::Connection(_))
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for AutomationError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		AutomationError::Connection(err.to_string())
	}
}

impl From<reqwest::Error> for AutomationError {
	fn from(err: reqwest::Error) -> Self {
		AutomationError::Endpoint(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, AutomationError>;
