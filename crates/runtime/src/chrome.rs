//! Chromium-family browser driven over the DevTools protocol.
//!
//! [`ChromeLauncher`] starts (or attaches to) one browser bound to a
//! persistent `--user-data-dir` so clearance cookies survive restarts. The
//! browser process is owned by [`ChromeBrowser`] and killed when it drops.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use slipcheck_protocol::{Cookie, CookieJar};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, trace};
use url::Url;

use crate::automation::{AutomationLauncher, AutomationPage, BrowserAutomation};
use crate::browser_finder::resolve_browser_executable;
use crate::cdp::{CdpConnection, DEFAULT_COMMAND_TIMEOUT};
use crate::error::{AutomationError, Result};
use crate::probe::fetch_cdp_endpoint;
use crate::process::free_port;
use crate::profile::prepare_profile_dir;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DOCUMENT_READY_JS: &str = "document.readyState !== 'loading' && location.href !== 'about:blank'";

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit browser executable; discovered when `None`.
	pub executable: Option<PathBuf>,
	/// Persistent profile directory.
	pub profile_dir: Option<PathBuf>,
	/// User agent the browser reports.
	pub user_agent: Option<String>,
	pub headless: bool,
	/// Attach to a browser already listening on this DevTools port instead of launching.
	pub attach_port: Option<u16>,
	/// How long to wait for the DevTools endpoint after spawning.
	pub startup_timeout: Duration,
	/// Per-command DevTools timeout.
	pub command_timeout: Duration,
	pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			executable: None,
			profile_dir: None,
			user_agent: None,
			headless: true,
			attach_port: None,
			startup_timeout: Duration::from_secs(20),
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
			extra_args: Vec::new(),
		}
	}
}

/// [`AutomationLauncher`] for Chrome/Chromium.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
	options: LaunchOptions,
}

impl ChromeLauncher {
	pub fn new(options: LaunchOptions) -> Self {
		Self { options }
	}
}

#[async_trait]
impl AutomationLauncher for ChromeLauncher {
	async fn launch(&self) -> Result<Arc<dyn BrowserAutomation>> {
		let browser = match self.options.attach_port {
			Some(port) => ChromeBrowser::attach(port, self.options.profile_dir.clone(), self.options.command_timeout).await?,
			None => ChromeBrowser::launch(&self.options).await?,
		};
		Ok(Arc::new(browser))
	}
}

/// Running browser plus its DevTools connection.
pub struct ChromeBrowser {
	conn: Arc<CdpConnection>,
	profile_dir: Option<PathBuf>,
	child: Mutex<Option<Child>>,
}

impl ChromeBrowser {
	/// Spawns a browser on a free DevTools port and connects to it.
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let executable = resolve_browser_executable(options.executable.as_deref()).ok_or(AutomationError::BrowserNotFound)?;

		let profile_dir = options.profile_dir.as_deref().and_then(prepare_profile_dir);
		let data_dir = match &profile_dir {
			Some(dir) => Some(dir.clone()),
			None => prepare_profile_dir(&std::env::temp_dir().join(format!("slipcheck-ephemeral-{}", std::process::id()))),
		};

		let port = free_port()?;
		let args = chrome_args(port, data_dir.as_deref(), options);

		info!(
			target = "slipcheck.browser",
			executable = %executable.display(),
			port,
			profile = ?profile_dir,
			headless = options.headless,
			"launching browser"
		);

		let mut child = Command::new(&executable)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| AutomationError::Launch(format!("Failed to launch browser at {}: {}", executable.display(), e)))?;

		let deadline = Instant::now() + options.startup_timeout;
		let info = loop {
			tokio::time::sleep(STARTUP_POLL_INTERVAL).await;

			if let Some(status) = child.try_wait()? {
				return Err(AutomationError::Launch(format!(
					"browser exited before DevTools endpoint became available (status: {})",
					status
				)));
			}

			match fetch_cdp_endpoint(port).await {
				Ok(info) => break info,
				Err(err) if Instant::now() >= deadline => {
					return Err(AutomationError::Launch(format!(
						"DevTools endpoint not available on port {} after {}ms: {}",
						port,
						options.startup_timeout.as_millis(),
						err
					)));
				}
				Err(_) => continue,
			}
		};

		let browser = Self::connect(&info.web_socket_debugger_url, profile_dir, options.command_timeout).await?;
		*browser.child.lock() = Some(child);
		info!(target = "slipcheck.browser", port, version = ?info.browser, "browser ready");
		Ok(browser)
	}

	/// Attaches to a browser already running with `--remote-debugging-port=<port>`.
	pub async fn attach(port: u16, profile_dir: Option<PathBuf>, command_timeout: Duration) -> Result<Self> {
		let info = fetch_cdp_endpoint(port).await?;
		info!(target = "slipcheck.browser", port, version = ?info.browser, "attaching to running browser");
		Self::connect(&info.web_socket_debugger_url, profile_dir, command_timeout).await
	}

	/// Connects to a browser-level DevTools websocket URL.
	pub async fn connect(ws_url: &str, profile_dir: Option<PathBuf>, command_timeout: Duration) -> Result<Self> {
		let conn = CdpConnection::connect(ws_url, command_timeout).await?;
		Ok(Self {
			conn: Arc::new(conn),
			profile_dir,
			child: Mutex::new(None),
		})
	}
}

#[async_trait]
impl BrowserAutomation for ChromeBrowser {
	async fn cookies(&self, url: &Url) -> Result<CookieJar> {
		let result = self.conn.call("Storage.getCookies", json!({}), None).await?;
		let cookies: Vec<Cookie> = match result.get("cookies") {
			Some(cookies) => serde_json::from_value(cookies.clone())?,
			None => Vec::new(),
		};
		Ok(CookieJar::for_url(cookies, url))
	}

	async fn new_page(&self) -> Result<Box<dyn AutomationPage>> {
		let page = ChromePage::open(Arc::clone(&self.conn)).await?;
		Ok(Box::new(page))
	}

	fn profile_dir(&self) -> Option<&Path> {
		self.profile_dir.as_deref()
	}

	async fn close(&self) -> Result<()> {
		// Attached browsers belong to someone else.
		if self.child.lock().is_none() {
			return Ok(());
		}
		debug!(target = "slipcheck.browser", "closing browser");
		match self.conn.call("Browser.close", json!({}), None).await {
			Ok(_) | Err(AutomationError::SessionClosed) => Ok(()),
			Err(err) => Err(err),
		}
	}
}

/// A page target attached through a flattened DevTools session.
pub struct ChromePage {
	conn: Arc<CdpConnection>,
	target_id: String,
	session_id: String,
}

impl ChromePage {
	async fn open(conn: Arc<CdpConnection>) -> Result<Self> {
		let created = conn.call("Target.createTarget", json!({ "url": "about:blank" }), None).await?;
		let target_id = string_field(&created, "targetId")?;

		let attached = conn
			.call("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }), None)
			.await?;
		let session_id = string_field(&attached, "sessionId")?;

		trace!(target = "slipcheck.browser", %target_id, %session_id, "page opened");
		Ok(Self { conn, target_id, session_id })
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		let result = self
			.conn
			.call(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
				Some(&self.session_id),
			)
			.await?;

		if let Some(exception) = result.get("exceptionDetails") {
			let text = exception["text"].as_str().unwrap_or("Unknown error");
			return Err(AutomationError::JavaScript(text.to_string()));
		}

		Ok(result["result"]["value"].clone())
	}

	/// Re-evaluates `expression` until it yields `true` or `timeout` expires.
	///
	/// Evaluation errors count as "not yet": the execution context is torn
	/// down and rebuilt while a challenge page redirects.
	async fn poll_until(&self, expression: &str, timeout: Duration, condition: String) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.evaluate(expression).await {
				Ok(Value::Bool(true)) => return Ok(()),
				Ok(_) => {}
				Err(err) => trace!(target = "slipcheck.browser", error = %err, "poll evaluation failed"),
			}

			if Instant::now() >= deadline {
				return Err(AutomationError::Timeout {
					ms: timeout.as_millis() as u64,
					condition,
				});
			}
			tokio::time::sleep(POLL_INTERVAL).await;
		}
	}
}

#[async_trait]
impl AutomationPage for ChromePage {
	async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()> {
		let started = Instant::now();
		let navigate = self.conn.call("Page.navigate", json!({ "url": url }), Some(&self.session_id));
		let result = tokio::time::timeout(timeout, navigate).await.map_err(|_| AutomationError::Timeout {
			ms: timeout.as_millis() as u64,
			condition: format!("navigation to {url}"),
		})??;

		if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
			return Err(AutomationError::Navigation {
				url: url.to_string(),
				reason: reason.to_string(),
			});
		}

		let remaining = timeout.saturating_sub(started.elapsed());
		self.poll_until(DOCUMENT_READY_JS, remaining, format!("{url} to become interactive")).await
	}

	async fn wait_for_cookies(&mut self, names: &[String], timeout: Duration) -> Result<()> {
		let expression = cookie_presence_js(names)?;
		self.poll_until(&expression, timeout, format!("cookies {}", names.join(", "))).await
	}

	async fn close(self: Box<Self>) -> Result<()> {
		self.conn
			.call("Target.closeTarget", json!({ "targetId": self.target_id }), None)
			.await
			.map(|_| ())
	}
}

/// Command-line arguments for a headless persistent-profile launch.
pub(crate) fn chrome_args(port: u16, data_dir: Option<&Path>, options: &LaunchOptions) -> Vec<String> {
	let mut args = vec![
		format!("--remote-debugging-port={}", port),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--no-sandbox".to_string(),
		"--disable-setuid-sandbox".to_string(),
		"--disable-dev-shm-usage".to_string(),
		"--disable-gpu".to_string(),
		"--disable-blink-features=AutomationControlled".to_string(),
		"--ignore-certificate-errors".to_string(),
		"--window-size=1280,800".to_string(),
	];

	if options.headless {
		args.push("--headless=new".to_string());
	}
	if let Some(dir) = data_dir {
		args.push(format!("--user-data-dir={}", dir.display()));
	}
	if let Some(user_agent) = &options.user_agent {
		args.push(format!("--user-agent={}", user_agent));
	}
	args.extend(options.extra_args.iter().cloned());
	args.push("about:blank".to_string());
	args
}

/// Expression that is `true` once every cookie name shows up in `document.cookie`.
pub(crate) fn cookie_presence_js(names: &[String]) -> Result<String> {
	let names = serde_json::to_string(names)?;
	Ok(format!("(() => {{ const jar = document.cookie; return {names}.every((name) => jar.includes(name)); }})()"))
}

fn string_field(value: &Value, field: &str) -> Result<String> {
	value
		.get(field)
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| AutomationError::InvalidResponse(format!("missing {field}")))
}
