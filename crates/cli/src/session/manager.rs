//! Clearance lifecycle: lazy browser launch, status reads, deduplicated renewal.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use slipcheck_runtime::{AutomationError, AutomationLauncher, AutomationPage, BrowserAutomation};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::fetch::{FetchOptions, merge_headers};
use super::keepalive::Keepalive;
use super::status::{ClearanceStatus, derive_status, now_ms};
use crate::config::SessionConfig;
use crate::error::{Result, SlipError};

type RenewalHandle = Shared<BoxFuture<'static, ()>>;
type AutomationCell = Arc<OnceCell<Arc<dyn BrowserAutomation>>>;

/// Count of renewals finished when a caller read its cookies.
///
/// Taken before a status read and handed back with a renewal request; a
/// renewal that finished in between already replaced those cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalEpoch(u64);

/// Why a renewal was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalReason {
	/// One of the clearance cookies is absent.
	Missing,
	/// Remaining lifetime is at or below the threshold.
	Threshold,
	/// Upstream rejected the current cookies.
	Rejected,
	/// Requested explicitly.
	Forced,
}

impl RenewalReason {
	pub fn as_str(self) -> &'static str {
		match self {
			RenewalReason::Missing => "missing",
			RenewalReason::Threshold => "threshold",
			RenewalReason::Rejected => "rejected",
			RenewalReason::Forced => "forced",
		}
	}
}

impl std::fmt::Display for RenewalReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Who asked for a freshness check; keepalive-originated renewals are logged as `poll-<reason>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
	Caller,
	Keepalive,
}

impl Trigger {
	fn label(self, reason: RenewalReason) -> String {
		match self {
			Trigger::Caller => reason.to_string(),
			Trigger::Keepalive => format!("poll-{reason}"),
		}
	}
}

/// Process-wide clearance session.
///
/// Cloning is cheap and every clone shares the same browser, renewal slot and
/// keepalive. At most one renewal runs at a time; concurrent requesters await
/// the one in flight, and requesters whose cookies predate a finished renewal
/// reuse its result.
#[derive(Clone)]
pub struct SessionManager {
	pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
	config: SessionConfig,
	launcher: Arc<dyn AutomationLauncher>,
	automation: Mutex<AutomationCell>,
	renewal: Mutex<Option<RenewalHandle>>,
	renewals_started: AtomicU64,
	/// Only written while `renewal` is locked.
	renewals_finished: AtomicU64,
	http: reqwest::Client,
	pub(super) keepalive: Keepalive,
}

impl SessionManager {
	/// Creates a manager whose outbound client uses `config.request_timeout`.
	pub fn new(config: SessionConfig, launcher: Arc<dyn AutomationLauncher>) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
		Ok(Self::with_client(config, launcher, http))
	}

	pub fn with_client(config: SessionConfig, launcher: Arc<dyn AutomationLauncher>, http: reqwest::Client) -> Self {
		Self {
			inner: Arc::new(Inner {
				config,
				launcher,
				automation: Mutex::new(AutomationCell::default()),
				renewal: Mutex::new(None),
				renewals_started: AtomicU64::new(0),
				renewals_finished: AtomicU64::new(0),
				http,
				keepalive: Keepalive::default(),
			}),
		}
	}

	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	/// Number of renewals started since creation.
	pub fn renewals_started(&self) -> u64 {
		self.inner.renewals_started.load(Ordering::SeqCst)
	}

	/// Renewals finished so far; pass it to [`SessionManager::renew_since`].
	pub fn renewal_epoch(&self) -> RenewalEpoch {
		RenewalEpoch(self.inner.renewals_finished.load(Ordering::SeqCst))
	}

	/// Profile directory of the running browser, else the configured one.
	pub fn profile_dir(&self) -> Option<PathBuf> {
		match self.inner.automation.lock().get() {
			Some(automation) => automation.profile_dir().map(PathBuf::from),
			None => self.inner.config.profile_dir.clone(),
		}
	}

	/// Launches the browser on first use; concurrent first callers share one launch.
	///
	/// A failed launch leaves the slot empty so the next call retries.
	async fn automation(&self) -> Result<Arc<dyn BrowserAutomation>> {
		let cell = self.inner.automation.lock().clone();
		let automation = cell
			.get_or_try_init(|| async {
				info!(target = "slipcheck.session", profile = ?self.inner.config.profile_dir, "launching automation session");
				self.inner.launcher.launch().await
			})
			.await?;
		Ok(Arc::clone(automation))
	}

	/// Drops `automation` from the slot when `err` shows its DevTools connection is gone, so the next use relaunches.
	fn forget_if_disconnected(&self, automation: &Arc<dyn BrowserAutomation>, err: &AutomationError) {
		if !err.is_disconnected() {
			return;
		}
		let mut slot = self.inner.automation.lock();
		if slot.get().is_some_and(|current| Arc::ptr_eq(current, automation)) {
			warn!(target = "slipcheck.session", error = %err, "automation session lost; relaunching on next use");
			*slot = AutomationCell::default();
		}
	}

	/// Reads the jar for the upstream origin and derives status, surfacing read failures.
	pub async fn try_status(&self) -> Result<ClearanceStatus> {
		let automation = self.automation().await?;
		let jar = automation
			.cookies(&self.inner.config.origin)
			.await
			.inspect_err(|err| self.forget_if_disconnected(&automation, err))?;
		let config = &self.inner.config;
		Ok(derive_status(&jar, &config.clearance_cookie, &config.affinity_cookie, now_ms()))
	}

	/// Current status; an unreadable jar yields [`ClearanceStatus::degraded`].
	pub async fn status(&self) -> ClearanceStatus {
		match self.try_status().await {
			Ok(status) => status,
			Err(err) => {
				warn!(target = "slipcheck.session", error = %err, "cannot read cookie jar; reporting no clearance");
				ClearanceStatus::degraded()
			}
		}
	}

	/// Renews when the clearance is missing or within the threshold, joining any renewal already in flight.
	pub async fn ensure_fresh(&self) {
		self.refresh(Trigger::Caller).await;
	}

	pub(crate) async fn refresh(&self, trigger: Trigger) {
		let epoch = self.renewal_epoch();
		let status = self.status().await;
		let threshold = self.inner.config.renew_threshold_min;
		if !status.needs_renewal(threshold) {
			debug!(target = "slipcheck.session", minutes_left = status.minutes_left, "clearance fresh");
			return;
		}

		let reason = if status.has_clearance {
			RenewalReason::Threshold
		} else {
			RenewalReason::Missing
		};
		self.request_renewal(reason, trigger, Some(epoch)).await;
	}

	/// Renews unconditionally, or waits for the renewal already in flight.
	pub async fn renew(&self, reason: RenewalReason) {
		self.request_renewal(reason, Trigger::Caller, None).await;
	}

	/// Renews cookies read at `epoch`, unless a renewal finished since then.
	///
	/// A renewal already in flight is joined either way.
	pub async fn renew_since(&self, reason: RenewalReason, epoch: RenewalEpoch) {
		self.request_renewal(reason, Trigger::Caller, Some(epoch)).await;
	}

	async fn request_renewal(&self, reason: RenewalReason, trigger: Trigger, observed: Option<RenewalEpoch>) {
		let handle = {
			let mut slot = self.inner.renewal.lock();
			match slot.as_ref() {
				Some(pending) => {
					debug!(target = "slipcheck.session", reason = %trigger.label(reason), "joining in-flight renewal");
					pending.clone()
				}
				None if observed.is_some_and(|epoch| epoch != self.renewal_epoch()) => {
					debug!(target = "slipcheck.session", reason = %trigger.label(reason), "cookies already renewed since read");
					return;
				}
				None => {
					let renewal = self.inner.renewals_started.fetch_add(1, Ordering::SeqCst) + 1;
					info!(target = "slipcheck.session", reason = %trigger.label(reason), renewal, "renewing clearance");

					let manager = self.clone();
					let task = tokio::spawn(async move {
						let _slot = ClearSlotOnDrop(manager.clone());
						manager.run_renewal().await;
					});
					let handle = async move {
						if let Err(err) = task.await {
							warn!(target = "slipcheck.session", error = %err, "renewal task aborted");
						}
					}
					.boxed()
					.shared();
					*slot = Some(handle.clone());
					handle
				}
			}
		};
		handle.await;
	}

	async fn run_renewal(&self) {
		let started = Instant::now();
		match self.navigate_for_clearance().await {
			Ok(()) => info!(
				target = "slipcheck.session",
				elapsed_ms = started.elapsed().as_millis() as u64,
				"renewal finished"
			),
			Err(err) => warn!(
				target = "slipcheck.session",
				error = %err,
				elapsed_ms = started.elapsed().as_millis() as u64,
				"renewal failed; keeping current cookies"
			),
		}
	}

	async fn navigate_for_clearance(&self) -> Result<()> {
		let automation = self.automation().await?;
		let mut page = automation
			.new_page()
			.await
			.inspect_err(|err| self.forget_if_disconnected(&automation, err))?;
		let outcome = self.drive_renewal_page(page.as_mut()).await;
		if let Err(SlipError::Automation(err)) = &outcome {
			self.forget_if_disconnected(&automation, err);
		}
		if let Err(err) = page.close().await {
			debug!(target = "slipcheck.session", error = %err, "renewal page close failed");
		}
		outcome
	}

	async fn drive_renewal_page(&self, page: &mut dyn AutomationPage) -> Result<()> {
		let config = &self.inner.config;
		let ping_url = config.ping_url();
		page.goto(ping_url.as_str(), config.nav_timeout).await?;

		match page.wait_for_cookies(&config.required_cookies(), config.cookie_wait).await {
			Ok(()) => {}
			Err(err) if err.is_timeout() => {
				warn!(target = "slipcheck.session", error = %err, "clearance cookies did not appear in time");
			}
			Err(err) => return Err(err.into()),
		}

		tokio::time::sleep(config.settle).await;
		Ok(())
	}

	/// Issues one request carrying the session cookies after a freshness check.
	///
	/// Never retries; rejection handling belongs to the caller.
	pub async fn session_fetch(&self, url: &str, options: FetchOptions) -> Result<reqwest::Response> {
		self.ensure_fresh().await;
		let status = self.status().await;
		let headers = merge_headers(&options.headers, &status.cookie_header, &self.inner.config.user_agent)?;

		let mut request = self.inner.http.request(options.method, url).headers(headers);
		if let Some(body) = options.body {
			request = request.body(body);
		}
		let response = request.send().await?;
		debug!(target = "slipcheck.session", %url, status = response.status().as_u16(), "session fetch");
		Ok(response)
	}

	/// Stops the keepalive and closes the browser if one was launched.
	pub async fn close(&self) {
		self.shutdown();
		let automation = self.inner.automation.lock().get().cloned();
		if let Some(automation) = automation {
			if let Err(err) = automation.close().await {
				warn!(target = "slipcheck.session", error = %err, "browser close failed");
			}
		}
	}
}

/// Marks the renewal finished and empties its slot when the task ends, including on panic.
struct ClearSlotOnDrop(SessionManager);

impl Drop for ClearSlotOnDrop {
	fn drop(&mut self) {
		let mut slot = self.0.inner.renewal.lock();
		self.0.inner.renewals_finished.fetch_add(1, Ordering::SeqCst);
		slot.take();
	}
}
