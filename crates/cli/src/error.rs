//! Error types for the slipcheck service and commands.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use slipcheck_protocol::ErrorBody;
use slipcheck_runtime::AutomationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlipError {
	/// Ticket did not normalize to exactly 14 digits.
	#[error("ticket must be exactly 14 digits (got \"{0}\")")]
	InvalidTicket(String),

	/// The upstream could not be reached or its response could not be read.
	#[error("upstream request failed: {0}")]
	Upstream(#[from] reqwest::Error),

	#[error(transparent)]
	Automation(#[from] AutomationError),

	#[error("invalid header value: {0}")]
	InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("{0}")]
	Context(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl SlipError {
	/// HTTP status used when this error ends a request.
	pub fn status_code(&self) -> StatusCode {
		match self {
			SlipError::InvalidTicket(_) => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for SlipError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		let body = ErrorBody {
			status: status.as_u16(),
			error: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}

pub type Result<T> = std::result::Result<T, SlipError>;
