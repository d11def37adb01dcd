//! Slip lookup against the sportsbook's JSON API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::Result;

/// Status the upstream uses to reject stale or missing clearance.
pub const FORBIDDEN: u16 = 403;

/// Upstream status plus body, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
	pub status: u16,
	/// Parsed JSON, or the raw body as a JSON string when it is not JSON.
	pub data: Value,
}

/// Fetches one slip by normalized ticket code.
#[async_trait]
pub trait SlipLookup: Send + Sync {
	/// Returns the reply for any HTTP status; errors only when no response was read.
	async fn lookup(&self, code: &str, cookie_header: &str) -> Result<UpstreamReply>;
}

/// [`SlipLookup`] over HTTP with the browser-like header set the API expects.
pub struct UpstreamClient {
	config: UpstreamConfig,
	http: reqwest::Client,
}

impl UpstreamClient {
	pub fn new(config: UpstreamConfig) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
		Ok(Self { config, http })
	}

	pub fn config(&self) -> &UpstreamConfig {
		&self.config
	}

	pub(crate) fn headers(&self, cookie_header: &str) -> Result<HeaderMap> {
		let config = &self.config;
		let user_agent = HeaderValue::from_str(&config.user_agent)?;
		let client_ip = HeaderValue::from_str(&config.client_ip)?;

		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("UK"));
		headers.insert(AUTHORIZATION, HeaderValue::from_static("null"));
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(REFERER, HeaderValue::from_str(config.ping_url().as_str())?);
		headers.insert(USER_AGENT, user_agent.clone());
		headers.insert(COOKIE, HeaderValue::from_str(cookie_header)?);

		let custom = [
			("x-mgs-businessunit", HeaderValue::from_static("2")),
			("x-clientdevice", user_agent),
			("x-clientip", client_ip.clone()),
			("x-mgs-clientip", client_ip),
			("x-location", HeaderValue::from_static("UK")),
			("x-mgs-location", HeaderValue::from_static("UK")),
			("priority", HeaderValue::from_static("u=1")),
			(
				"sec-ch-ua",
				HeaderValue::from_static(r#""Chromium";v="142", "Google Chrome";v="142", "Not_A Brand";v="99""#),
			),
			("sec-ch-ua-mobile", HeaderValue::from_static("?0")),
			("sec-ch-ua-platform", HeaderValue::from_static(r#""Windows""#)),
			("sec-fetch-dest", HeaderValue::from_static("empty")),
			("sec-fetch-mode", HeaderValue::from_static("cors")),
			("sec-fetch-site", HeaderValue::from_static("same-origin")),
		];
		for (name, value) in custom {
			headers.insert(HeaderName::from_static(name), value);
		}
		Ok(headers)
	}
}

#[async_trait]
impl SlipLookup for UpstreamClient {
	async fn lookup(&self, code: &str, cookie_header: &str) -> Result<UpstreamReply> {
		let url = self.config.slip_url(code);
		let response = self.http.get(url.clone()).headers(self.headers(cookie_header)?).send().await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?;

		debug!(target = "slipcheck.upstream", %url, status, bytes = body.len(), "slip lookup");
		Ok(UpstreamReply {
			status,
			data: parse_body(&body),
		})
	}
}

/// Parses a body as JSON, falling back to its lossy UTF-8 text.
pub(crate) fn parse_body(body: &[u8]) -> Value {
	serde_json::from_slice(body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
