//! Ticket lookup with one renewal-and-retry on rejection.

use std::time::Duration;

use slipcheck_protocol::{CheckMeta, CheckResponse};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, SlipError};
use crate::session::{ClearanceStatus, RenewalReason, SessionManager};
use crate::upstream::{FORBIDDEN, SlipLookup, UpstreamReply};

pub const TICKET_DIGITS: usize = 14;

/// Strips non-digits and requires exactly [`TICKET_DIGITS`] digits.
pub fn normalize_ticket(raw: &str) -> Result<String> {
	let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
	if digits.len() == TICKET_DIGITS {
		Ok(digits)
	} else {
		Err(SlipError::InvalidTicket(raw.trim().to_string()))
	}
}

/// Result of one [`check_ticket`] run.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
	pub reply: UpstreamReply,
	/// Upstream calls made (1 or 2).
	pub attempts: u32,
	pub renewed: bool,
	/// Status whose cookie header was sent on the last attempt.
	pub clearance: ClearanceStatus,
	pub elapsed: Duration,
}

impl CheckOutcome {
	pub fn into_response(self, include_meta: bool) -> CheckResponse {
		let meta = include_meta.then(|| CheckMeta {
			attempts: self.attempts,
			renewed: self.renewed,
			has_clearance: self.clearance.has_clearance,
			minutes_left: self.clearance.minutes_left,
			elapsed_ms: self.elapsed.as_millis() as u64,
		});
		CheckResponse {
			status: self.reply.status,
			data: self.reply.data,
			meta,
		}
	}
}

/// Looks up `code` with the current cookies; on [`FORBIDDEN`], renews and retries exactly once.
///
/// A renewal that finished after the cookies were read counts as this call's
/// renewal. The second reply is returned as-is even when it is rejected again.
pub async fn check_ticket(session: &SessionManager, upstream: &dyn SlipLookup, code: &str) -> Result<CheckOutcome> {
	let started = Instant::now();

	let epoch = session.renewal_epoch();
	let mut clearance = session.status().await;
	let mut reply = upstream.lookup(code, &clearance.cookie_header).await?;
	let mut attempts = 1;
	let mut renewed = false;

	if reply.status == FORBIDDEN {
		info!(target = "slipcheck.check", %code, "upstream rejected clearance; renewing before retry");
		session.renew_since(RenewalReason::Rejected, epoch).await;
		renewed = true;

		clearance = session.status().await;
		reply = upstream.lookup(code, &clearance.cookie_header).await?;
		attempts = 2;
	}

	debug!(target = "slipcheck.check", %code, status = reply.status, attempts, "lookup finished");
	Ok(CheckOutcome {
		reply,
		attempts,
		renewed,
		clearance,
		elapsed: started.elapsed(),
	})
}
