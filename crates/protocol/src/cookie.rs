//! Cookie wire types and `Cookie:` header encoding.

use serde::{Deserialize, Serialize};
use url::Url;

/// A browser cookie as reported by the DevTools `Storage.getCookies` call.
///
/// `expires` is seconds since the Unix epoch; DevTools reports `-1` for
/// session cookies, which [`Cookie::expires_at_ms`] maps to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default)]
	pub domain: String,
	#[serde(default = "default_path")]
	pub path: String,
	#[serde(default = "session_expiry")]
	pub expires: f64,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<String>,
}

fn default_path() -> String {
	"/".to_string()
}

fn session_expiry() -> f64 {
	-1.0
}

impl Cookie {
	/// Creates a host-less session cookie, as parsed from a `Cookie:` header.
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: String::new(),
			path: default_path(),
			expires: session_expiry(),
			http_only: false,
			secure: false,
			same_site: None,
		}
	}

	/// Sets the cookie domain.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = domain.into();
		self
	}

	/// Sets the expiry in seconds since the Unix epoch.
	pub fn with_expires(mut self, expires_secs: f64) -> Self {
		self.expires = expires_secs;
		self
	}

	/// Declared expiry in milliseconds since the Unix epoch, `None` for session cookies.
	pub fn expires_at_ms(&self) -> Option<i64> {
		if self.expires.is_finite() && self.expires > 0.0 {
			Some((self.expires * 1000.0) as i64)
		} else {
			None
		}
	}

	/// Returns `true` when the browser would send this cookie with a request to `url`.
	pub fn matches_url(&self, url: &Url) -> bool {
		let Some(host) = url.host_str() else {
			return false;
		};
		if self.secure && url.scheme() != "https" {
			return false;
		}
		domain_matches(host, &self.domain) && path_matches(url.path(), &self.path)
	}
}

fn domain_matches(host: &str, cookie_domain: &str) -> bool {
	let domain = cookie_domain.trim_start_matches('.');
	if domain.is_empty() {
		return false;
	}
	let host = host.to_ascii_lowercase();
	let domain = domain.to_ascii_lowercase();
	host == domain || host.strip_suffix(domain.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
	if cookie_path.is_empty() || cookie_path == "/" {
		return true;
	}
	match request_path.strip_prefix(cookie_path) {
		Some(rest) => rest.is_empty() || rest.starts_with('/') || cookie_path.ends_with('/'),
		None => false,
	}
}

/// Ordered set of cookies scoped to one origin.
///
/// Order is the browser's iteration order and is preserved by
/// [`CookieJar::to_header`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
	cookies: Vec<Cookie>,
}

impl CookieJar {
	pub fn new(cookies: Vec<Cookie>) -> Self {
		Self { cookies }
	}

	/// Keeps only the cookies the browser would send to `url`.
	pub fn for_url(cookies: impl IntoIterator<Item = Cookie>, url: &Url) -> Self {
		Self {
			cookies: cookies.into_iter().filter(|cookie| cookie.matches_url(url)).collect(),
		}
	}

	/// Parses a `Cookie:` header value into a jar of name/value session cookies.
	pub fn from_header(header: &str) -> Self {
		Self {
			cookies: parse_cookie_header(header).into_iter().map(|(name, value)| Cookie::new(name, value)).collect(),
		}
	}

	/// First cookie named `name`.
	pub fn get(&self, name: &str) -> Option<&Cookie> {
		self.cookies.iter().find(|cookie| cookie.name == name)
	}

	/// Returns `true` when every name in `names` is present.
	pub fn contains_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
		names.iter().all(|name| self.get(name.as_ref()).is_some())
	}

	/// Serializes the jar as `name=value; name=value` in jar order.
	pub fn to_header(&self) -> String {
		self.cookies
			.iter()
			.map(|cookie| format!("{}={}", cookie.name, cookie.value))
			.collect::<Vec<_>>()
			.join("; ")
	}

	pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
		self.cookies.iter()
	}

	pub fn len(&self) -> usize {
		self.cookies.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty()
	}
}

impl FromIterator<Cookie> for CookieJar {
	fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
		Self::new(iter.into_iter().collect())
	}
}

/// Splits a `Cookie:` header value into ordered `(name, value)` pairs.
///
/// Empty segments are skipped; a segment without `=` yields an empty value.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
	header
		.split(';')
		.map(str::trim)
		.filter(|segment| !segment.is_empty())
		.map(|segment| match segment.split_once('=') {
			Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
			None => (segment.to_string(), String::new()),
		})
		.collect()
}
