use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use slipcheck_runtime::default_profile_dir;

use crate::config::{DEFAULT_CLIENT_IP, DEFAULT_ORIGIN, DEFAULT_RENEW_THRESHOLD_MIN, DEFAULT_USER_AGENT};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "slipcheck")]
#[command(about = "Betting-slip lookup proxy with a self-renewing browser clearance session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format for command results
	#[arg(short, long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(flatten)]
	pub session: SessionArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Session, browser and upstream settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
	/// Persistent browser profile directory
	#[arg(long, env = "CF_PROFILE_DIR", default_value_os_t = default_profile_dir())]
	pub profile_dir: PathBuf,

	/// Renew the clearance when this many minutes or fewer remain
	#[arg(long, env = "RENEW_THRESHOLD_MIN", default_value_t = DEFAULT_RENEW_THRESHOLD_MIN)]
	pub renew_threshold_min: u64,

	/// User agent for the browser and upstream requests
	#[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
	pub user_agent: String,

	/// Client IP reported to the slip API
	#[arg(long, env = "SPORTS_IP", default_value = DEFAULT_CLIENT_IP)]
	pub client_ip: String,

	/// Upstream sportsbook origin
	#[arg(long, env = "SLIP_ORIGIN", default_value = DEFAULT_ORIGIN)]
	pub origin: String,

	/// Chrome/Chromium executable (discovered when omitted)
	#[arg(long, env = "CHROME_PATH", value_name = "PATH")]
	pub browser_path: Option<PathBuf>,

	/// Attach to a browser already listening on this DevTools port
	#[arg(long, value_name = "PORT")]
	pub cdp_port: Option<u16>,

	/// Show the browser window
	#[arg(long)]
	pub headful: bool,

	/// Seconds between background freshness checks
	#[arg(long, default_value_t = 300)]
	pub keepalive_secs: u64,

	/// Navigation timeout for renewals (seconds)
	#[arg(long, default_value_t = 45)]
	pub nav_timeout_secs: u64,

	/// How long a renewal waits for clearance cookies (seconds)
	#[arg(long, default_value_t = 90)]
	pub cookie_wait_secs: u64,

	/// Pause after clearance cookies appear (milliseconds)
	#[arg(long, default_value_t = 800)]
	pub settle_ms: u64,

	/// URL fetched through the session by the health endpoint (defaults to the ping page)
	#[arg(long, value_name = "URL")]
	pub probe_url: Option<String>,

	/// Health endpoint only checks freshness instead of fetching a probe URL
	#[arg(long, conflicts_with = "probe_url")]
	pub no_probe: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP API with background clearance keepalive
	Serve {
		/// Address to listen on
		#[arg(long, env = "SLIPCHECK_BIND", default_value = "127.0.0.1:3000")]
		bind: SocketAddr,
	},

	/// Show the current clearance status without renewing
	#[command(alias = "st")]
	Status,

	/// Force one clearance renewal and show the resulting status
	Renew,

	/// Look up one ticket through the session, retrying once on rejection
	Check {
		/// 14-digit ticket code (non-digits are ignored)
		ticket: String,

		/// Include attempt and clearance diagnostics
		#[arg(long)]
		debug: bool,
	},
}
