//! HTTP API: `/api/check` and `/api/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use slipcheck_protocol::{CheckResponse, HealthResponse};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::check::{check_ticket, normalize_ticket};
use crate::config::HealthProbe;
use crate::error::{Result, SlipError};
use crate::session::{FetchOptions, SessionManager};
use crate::upstream::SlipLookup;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	pub session: SessionManager,
	pub upstream: Arc<dyn SlipLookup>,
	pub health_probe: HealthProbe,
}

impl AppState {
	/// Builds the state and starts the session keepalive.
	pub fn new(session: SessionManager, upstream: Arc<dyn SlipLookup>, health_probe: HealthProbe) -> Self {
		session.start_keepalive();
		Self {
			session,
			upstream,
			health_probe,
		}
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/check", get(check_handler))
		.route("/api/health", get(health_handler))
		.with_state(state)
}

/// `/api/check` query; `code` and `t` are accepted as aliases of `ticket`.
#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
	ticket: Option<String>,
	code: Option<String>,
	t: Option<String>,
	debug: Option<String>,
}

impl CheckQuery {
	fn ticket(&self) -> &str {
		self.ticket.as_deref().or(self.code.as_deref()).or(self.t.as_deref()).unwrap_or_default()
	}

	fn debug(&self) -> bool {
		matches!(self.debug.as_deref(), Some(value) if value != "0" && !value.eq_ignore_ascii_case("false"))
	}
}

async fn check_handler(State(state): State<AppState>, Query(query): Query<CheckQuery>) -> Result<Json<CheckResponse>> {
	let code = normalize_ticket(query.ticket())?;
	let outcome = check_ticket(&state.session, state.upstream.as_ref(), &code).await.inspect_err(|err| {
		warn!(target = "slipcheck.server", %code, error = %err, "check failed");
	})?;
	Ok(Json(outcome.into_response(query.debug())))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
	match health(&state).await {
		Ok(response) => Json(response),
		Err(err) => {
			warn!(target = "slipcheck.server", error = %err, "health check failed");
			Json(HealthResponse::failed(err.to_string()))
		}
	}
}

async fn health(state: &AppState) -> Result<HealthResponse> {
	match &state.health_probe {
		HealthProbe::Fetch(url) => {
			// Only the freshness side effect matters; the body is discarded unread.
			let probe = state.session.session_fetch(url.as_str(), FetchOptions::default()).await?;
			debug!(target = "slipcheck.server", status = probe.status().as_u16(), "health probe answered");
			drop(probe);
		}
		HealthProbe::EnsureFresh => state.session.ensure_fresh().await,
	}

	let status = state.session.try_status().await?;
	Ok(HealthResponse {
		ok: true,
		profile_dir: state.session.profile_dir().map(|dir| dir.display().to_string()),
		has_clearance: Some(status.has_clearance),
		minutes_left: Some(status.minutes_left),
		expires_at: Some(status.expires_at),
		error: None,
	})
}

/// Serves the API on `bind` until Ctrl-C, then stops the keepalive and closes the browser.
pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
	let listener = TcpListener::bind(bind)
		.await
		.map_err(|e| SlipError::Context(format!("Failed to bind to {bind}: {e}")))?;
	info!(target = "slipcheck.server", addr = %listener.local_addr()?, "listening");

	let session = state.session.clone();
	let served = axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(|e| SlipError::Context(format!("Server error: {e}")));

	session.close().await;
	served
}

async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!(target = "slipcheck.server", "shutdown requested"),
		Err(err) => {
			warn!(target = "slipcheck.server", error = %err, "cannot listen for Ctrl-C; running until killed");
			std::future::pending::<()>().await;
		}
	}
}
