//! Request options and header merging for session-backed requests.

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::Result;

/// Options for [`SessionManager::session_fetch`](super::SessionManager::session_fetch).
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
	pub method: Method,
	/// Caller headers; `cookie` and `user-agent` are overridden.
	pub headers: HeaderMap,
	pub body: Option<Vec<u8>>,
}

impl FetchOptions {
	pub fn new(method: Method) -> Self {
		Self {
			method,
			..Self::default()
		}
	}

	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());
		self
	}
}

/// Builds outgoing headers: session cookie and user agent always win, JSON
/// `accept`/`content-type` fill in when the caller left them unset.
pub(crate) fn merge_headers(caller: &HeaderMap, cookie_header: &str, user_agent: &str) -> Result<HeaderMap> {
	let mut headers = caller.clone();
	headers.insert(COOKIE, HeaderValue::from_str(cookie_header)?);
	headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);

	let json = HeaderValue::from_static("application/json");
	headers.entry(ACCEPT).or_insert_with(|| json.clone());
	headers.entry(CONTENT_TYPE).or_insert(json);
	Ok(headers)
}
