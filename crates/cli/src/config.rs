//! Runtime configuration assembled from CLI arguments and environment.

use std::path::PathBuf;
use std::time::Duration;

use slipcheck_runtime::LaunchOptions;
use url::Url;

use crate::cli::SessionArgs;
use crate::error::{Result, SlipError};

pub const DEFAULT_ORIGIN: &str = "https://www-talo-ssb-pr.sportslottery.com.tw";
pub const DEFAULT_USER_AGENT: &str =
	"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
pub const DEFAULT_CLIENT_IP: &str = "118.165.7.197";
pub const DEFAULT_RENEW_THRESHOLD_MIN: u64 = 15;

/// Page navigated during renewal; visiting it issues the clearance cookies.
pub const PING_PATH: &str = "/betslipbrowser";
const SLIP_PATH_PREFIX: &str = "/API/betting/fo/bets/code/";

/// Anti-bot clearance cookie.
pub const CLEARANCE_COOKIE: &str = "cf_clearance";
/// Load-balancer affinity cookie.
pub const AFFINITY_COOKIE: &str = "SERVERID";

/// Policy and timing for the clearance session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Upstream origin whose cookie jar is managed.
	pub origin: Url,
	/// User agent forced on every session-backed request.
	pub user_agent: String,
	/// Renew when this many minutes or fewer remain.
	pub renew_threshold_min: u64,
	pub clearance_cookie: String,
	pub affinity_cookie: String,
	/// Configured profile directory, reported by the health endpoint.
	pub profile_dir: Option<PathBuf>,
	pub nav_timeout: Duration,
	/// Bound on waiting for clearance cookies; expiry is not an error.
	pub cookie_wait: Duration,
	/// Pause after the cookies appear so the browser persists them.
	pub settle: Duration,
	pub keepalive_period: Duration,
	/// Timeout for requests issued through `session_fetch`.
	pub request_timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			origin: default_origin(),
			user_agent: DEFAULT_USER_AGENT.to_string(),
			renew_threshold_min: DEFAULT_RENEW_THRESHOLD_MIN,
			clearance_cookie: CLEARANCE_COOKIE.to_string(),
			affinity_cookie: AFFINITY_COOKIE.to_string(),
			profile_dir: None,
			nav_timeout: Duration::from_secs(45),
			cookie_wait: Duration::from_secs(90),
			settle: Duration::from_millis(800),
			keepalive_period: Duration::from_secs(5 * 60),
			request_timeout: Duration::from_secs(30),
		}
	}
}

impl SessionConfig {
	/// Both cookie names that make up a clearance.
	pub fn required_cookies(&self) -> Vec<String> {
		vec![self.clearance_cookie.clone(), self.affinity_cookie.clone()]
	}

	pub fn ping_url(&self) -> Url {
		ping_url(&self.origin)
	}
}

/// Identity presented to the slip API.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
	pub origin: Url,
	pub user_agent: String,
	pub client_ip: String,
	pub request_timeout: Duration,
}

impl Default for UpstreamConfig {
	fn default() -> Self {
		Self {
			origin: default_origin(),
			user_agent: DEFAULT_USER_AGENT.to_string(),
			client_ip: DEFAULT_CLIENT_IP.to_string(),
			request_timeout: Duration::from_secs(30),
		}
	}
}

impl UpstreamConfig {
	/// Slip lookup URL for a normalized ticket code.
	pub fn slip_url(&self, code: &str) -> Url {
		let mut url = self.origin.clone();
		url.set_path(&format!("{SLIP_PATH_PREFIX}{code}"));
		url
	}

	pub fn ping_url(&self) -> Url {
		ping_url(&self.origin)
	}
}

/// What `/api/health` does before reading status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthProbe {
	/// Issue one `session_fetch` against this URL.
	Fetch(Url),
	/// Only run the freshness check.
	EnsureFresh,
}

/// Everything a command needs, resolved once from [`SessionArgs`].
#[derive(Debug, Clone)]
pub struct Settings {
	pub session: SessionConfig,
	pub upstream: UpstreamConfig,
	pub launch: LaunchOptions,
	pub health_probe: HealthProbe,
}

impl Settings {
	pub fn from_args(args: &SessionArgs) -> Result<Self> {
		let origin = Url::parse(&args.origin).map_err(|e| SlipError::Config(format!("invalid origin {:?}: {}", args.origin, e)))?;
		if !matches!(origin.scheme(), "http" | "https") {
			return Err(SlipError::Config(format!("origin must be http(s), got {}", origin)));
		}

		let session = SessionConfig {
			origin: origin.clone(),
			user_agent: args.user_agent.clone(),
			renew_threshold_min: args.renew_threshold_min,
			profile_dir: Some(args.profile_dir.clone()),
			nav_timeout: Duration::from_secs(args.nav_timeout_secs),
			cookie_wait: Duration::from_secs(args.cookie_wait_secs),
			settle: Duration::from_millis(args.settle_ms),
			keepalive_period: Duration::from_secs(args.keepalive_secs.max(1)),
			..SessionConfig::default()
		};

		let upstream = UpstreamConfig {
			origin: origin.clone(),
			user_agent: args.user_agent.clone(),
			client_ip: args.client_ip.clone(),
			..UpstreamConfig::default()
		};

		let launch = LaunchOptions {
			executable: args.browser_path.clone(),
			profile_dir: Some(args.profile_dir.clone()),
			user_agent: Some(args.user_agent.clone()),
			headless: !args.headful,
			attach_port: args.cdp_port,
			..LaunchOptions::default()
		};

		let health_probe = match (&args.probe_url, args.no_probe) {
			(_, true) => HealthProbe::EnsureFresh,
			(Some(raw), false) => {
				HealthProbe::Fetch(Url::parse(raw).map_err(|e| SlipError::Config(format!("invalid probe URL {:?}: {}", raw, e)))?)
			}
			(None, false) => HealthProbe::Fetch(session.ping_url()),
		};

		Ok(Self {
			session,
			upstream,
			launch,
			health_probe,
		})
	}
}

fn ping_url(origin: &Url) -> Url {
	let mut url = origin.clone();
	url.set_path(PING_PATH);
	url.set_query(None);
	url
}

fn default_origin() -> Url {
	match Url::parse(DEFAULT_ORIGIN) {
		Ok(url) => url,
		Err(_) => unreachable!("DEFAULT_ORIGIN is a valid URL"),
	}
}
