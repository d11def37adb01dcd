//! JSON bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a successful `GET /api/check`.
///
/// `status` is the upstream HTTP status, not the transport status of this
/// response; a rejected lookup still produces a `200` carrying `status: 403`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
	pub status: u16,
	pub data: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta: Option<CheckMeta>,
}

/// Diagnostics attached to [`CheckResponse`] when `debug` is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckMeta {
	/// Upstream calls made for this lookup (1 or 2).
	pub attempts: u32,
	/// Whether a renewal ran between the attempts.
	pub renewed: bool,
	pub has_clearance: bool,
	pub minutes_left: u64,
	pub elapsed_ms: u64,
}

/// Body returned for validation and handler failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
	pub status: u16,
	pub error: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub ok: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile_dir: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub has_clearance: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub minutes_left: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl HealthResponse {
	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			ok: false,
			profile_dir: None,
			has_clearance: None,
			minutes_left: None,
			expires_at: None,
			error: Some(error.into()),
		}
	}
}
