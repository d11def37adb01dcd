//! Periodic background freshness checks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::manager::{SessionManager, Trigger};

#[derive(Default)]
pub(super) struct Keepalive {
	started: AtomicBool,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
	/// Starts the keepalive loop; returns `false` if it was already started.
	///
	/// The first check runs one full period after start. Each check runs on
	/// its own task so a panicking check is logged and the loop continues.
	/// The loop holds only a weak reference and ends once every manager
	/// handle is dropped.
	pub fn start_keepalive(&self) -> bool {
		let keepalive = &self.inner.keepalive;
		if keepalive.started.swap(true, Ordering::SeqCst) {
			return false;
		}

		let period = self.config().keepalive_period;
		let weak = Arc::downgrade(&self.inner);
		info!(target = "slipcheck.keepalive", period_secs = period.as_secs(), "keepalive started");

		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				let Some(inner) = weak.upgrade() else {
					debug!(target = "slipcheck.keepalive", "session dropped; keepalive exiting");
					break;
				};
				let manager = SessionManager { inner };

				let check = tokio::spawn(async move { manager.refresh(Trigger::Keepalive).await });
				if let Err(err) = check.await {
					warn!(target = "slipcheck.keepalive", error = %err, "keepalive check failed");
				}
			}
		});
		*keepalive.task.lock() = Some(task);
		true
	}

	pub fn keepalive_running(&self) -> bool {
		self.inner.keepalive.task.lock().as_ref().is_some_and(|task| !task.is_finished())
	}

	/// Aborts the keepalive loop. A later [`start_keepalive`](Self::start_keepalive) starts a new one.
	pub fn shutdown(&self) {
		let keepalive = &self.inner.keepalive;
		if let Some(task) = keepalive.task.lock().take() {
			task.abort();
			info!(target = "slipcheck.keepalive", "keepalive stopped");
		}
		keepalive.started.store(false, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::session::testing::{FakeLauncher, test_config};

	#[tokio::test(start_paused = true)]
	async fn start_is_idempotent() {
		let session = SessionManager::new(test_config(), FakeLauncher::new()).unwrap();
		assert!(session.start_keepalive());
		assert!(!session.start_keepalive());
		assert!(!session.clone().start_keepalive());
		assert!(session.keepalive_running());

		session.shutdown();
		assert!(!session.keepalive_running());
		assert!(session.start_keepalive());
	}

	#[tokio::test(start_paused = true)]
	async fn first_check_waits_one_full_period() {
		let launcher = FakeLauncher::new();
		let session = SessionManager::new(test_config(), launcher.clone()).unwrap();
		let period = session.config().keepalive_period;
		session.start_keepalive();

		tokio::time::sleep(period - Duration::from_secs(1)).await;
		assert_eq!(launcher.launches(), 0);
		assert_eq!(launcher.state.navigations(), 0);

		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(launcher.state.navigations(), 1);

		tokio::time::sleep(period).await;
		assert_eq!(launcher.state.navigations(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn panicking_check_does_not_stop_the_loop() {
		let launcher = FakeLauncher::new();
		launcher.state.panic_reads.store(true, std::sync::atomic::Ordering::SeqCst);
		let session = SessionManager::new(test_config(), launcher.clone()).unwrap();
		let period = session.config().keepalive_period;
		session.start_keepalive();

		tokio::time::sleep(period * 2 + Duration::from_secs(1)).await;
		assert!(session.keepalive_running());
		assert!(launcher.state.cookie_reads() >= 2);
	}

	#[tokio::test(start_paused = true)]
	async fn loop_ends_when_session_is_dropped() {
		let launcher = FakeLauncher::new();
		let session = SessionManager::new(test_config(), launcher.clone()).unwrap();
		let period = session.config().keepalive_period;
		session.start_keepalive();
		let task = session.inner.keepalive.task.lock().take().unwrap();
		drop(session);

		tokio::time::sleep(period + Duration::from_secs(1)).await;
		assert!(task.is_finished());
		assert_eq!(launcher.launches(), 0);
	}
}
