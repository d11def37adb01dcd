//! Clearance status derived from a cookie jar snapshot.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use slipcheck_protocol::CookieJar;

const MINUTE_MS: i64 = 60_000;
/// Assumed lifetime of a clearance cookie without a declared expiry.
const SESSION_COOKIE_TTL_MS: i64 = 55 * MINUTE_MS;
/// Declared expiries further out than this are not trusted.
const TRUSTED_HORIZON_MS: i64 = 24 * 60 * MINUTE_MS;
/// Replacement lifetime for an untrusted far-future expiry.
const FAR_FUTURE_TTL_MS: i64 = 60 * MINUTE_MS;

/// Point-in-time view of the clearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceStatus {
	/// Both the clearance and the affinity cookie are present.
	pub has_clearance: bool,
	/// Effective expiry in ms since the epoch; `0` without clearance.
	pub expires_at: i64,
	pub minutes_left: u64,
	/// Full jar serialized as a `Cookie:` header, present even without clearance.
	pub cookie_header: String,
}

impl ClearanceStatus {
	/// Status reported when the jar cannot be read.
	pub fn degraded() -> Self {
		Self {
			has_clearance: false,
			expires_at: 0,
			minutes_left: 0,
			cookie_header: String::new(),
		}
	}

	/// Whether a renewal is due at `threshold_min`.
	pub fn needs_renewal(&self, threshold_min: u64) -> bool {
		!self.has_clearance || self.minutes_left <= threshold_min
	}
}

/// Derives the status of `jar` at `now_ms`.
pub fn derive_status(jar: &CookieJar, clearance_cookie: &str, affinity_cookie: &str, now_ms: i64) -> ClearanceStatus {
	let cookie_header = jar.to_header();
	let clearance = jar.get(clearance_cookie);
	let has_clearance = clearance.is_some() && jar.get(affinity_cookie).is_some();

	let expires_at = match clearance {
		Some(cookie) if has_clearance => effective_expiry(cookie.expires_at_ms(), now_ms),
		_ => 0,
	};
	let minutes_left = if expires_at > now_ms {
		((expires_at - now_ms) / MINUTE_MS) as u64
	} else {
		0
	};

	ClearanceStatus {
		has_clearance,
		expires_at,
		minutes_left,
		cookie_header,
	}
}

fn effective_expiry(declared_ms: Option<i64>, now_ms: i64) -> i64 {
	match declared_ms {
		None => now_ms + SESSION_COOKIE_TTL_MS,
		Some(ms) if ms - now_ms > TRUSTED_HORIZON_MS => now_ms + FAR_FUTURE_TTL_MS,
		Some(ms) => ms,
	}
}

/// Current wall-clock time in ms since the epoch.
pub fn now_ms() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use slipcheck_protocol::Cookie;

	use super::*;

	const NOW: i64 = 1_760_000_000_000;

	fn jar(clearance_expires_ms: Option<i64>, with_affinity: bool) -> CookieJar {
		let mut cookies = vec![Cookie::new("_ga", "x")];
		let mut clearance = Cookie::new("cf_clearance", "c");
		if let Some(ms) = clearance_expires_ms {
			clearance = clearance.with_expires(ms as f64 / 1000.0);
		}
		cookies.push(clearance);
		if with_affinity {
			cookies.push(Cookie::new("SERVERID", "s"));
		}
		CookieJar::new(cookies)
	}

	fn derive(jar: &CookieJar, now: i64) -> ClearanceStatus {
		derive_status(jar, "cf_clearance", "SERVERID", now)
	}

	#[test]
	fn declared_expiry_within_horizon_is_used() {
		let status = derive(&jar(Some(NOW + 30 * MINUTE_MS + 59_000), true), NOW);
		assert!(status.has_clearance);
		assert_eq!(status.expires_at, NOW + 30 * MINUTE_MS + 59_000);
		assert_eq!(status.minutes_left, 30);
		assert_eq!(status.cookie_header, "_ga=x; cf_clearance=c; SERVERID=s");
	}

	#[test]
	fn session_cookie_gets_fifty_five_minutes() {
		let status = derive(&jar(None, true), NOW);
		assert_eq!(status.expires_at, NOW + 55 * MINUTE_MS);
		assert_eq!(status.minutes_left, 55);
	}

	#[test]
	fn far_future_expiry_is_clamped_to_an_hour() {
		let status = derive(&jar(Some(NOW + 365 * 24 * 60 * MINUTE_MS), true), NOW);
		assert_eq!(status.expires_at, NOW + 60 * MINUTE_MS);
		assert_eq!(status.minutes_left, 60);
	}

	#[test]
	fn missing_affinity_cookie_means_no_clearance() {
		let status = derive(&jar(Some(NOW + 30 * MINUTE_MS), false), NOW);
		assert!(!status.has_clearance);
		assert_eq!(status.expires_at, 0);
		assert_eq!(status.minutes_left, 0);
		assert_eq!(status.cookie_header, "_ga=x; cf_clearance=c");
	}

	#[test]
	fn expired_clearance_reports_zero_minutes() {
		let status = derive(&jar(Some(NOW - MINUTE_MS), true), NOW);
		assert!(status.has_clearance);
		assert_eq!(status.minutes_left, 0);
		assert!(status.needs_renewal(15));
	}

	#[test]
	fn minutes_left_never_increases_as_time_passes() {
		let jar = jar(Some(NOW + 20 * MINUTE_MS), true);
		let mut previous = u64::MAX;
		for step in 0..30 {
			let status = derive(&jar, NOW + step * 45_000);
			assert!(status.minutes_left <= previous);
			previous = status.minutes_left;
		}
		assert_eq!(previous, 0);
	}

	#[test]
	fn renewal_threshold_is_inclusive() {
		let status = derive(&jar(Some(NOW + 15 * MINUTE_MS + 1_000), true), NOW);
		assert_eq!(status.minutes_left, 15);
		assert!(status.needs_renewal(15));
		assert!(!status.needs_renewal(14));
	}

	#[test]
	fn degraded_status_is_empty() {
		let status = ClearanceStatus::degraded();
		assert!(!status.has_clearance);
		assert!(status.cookie_header.is_empty());
		assert!(status.needs_renewal(0));
	}
}
