use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::server::{self, AppState};
use crate::upstream::UpstreamClient;

pub async fn execute(settings: &Settings, bind: SocketAddr) -> Result<()> {
	let session = super::session_manager(settings)?;
	let upstream = Arc::new(UpstreamClient::new(settings.upstream.clone())?);

	info!(
		target = "slipcheck.server",
		origin = %settings.session.origin,
		threshold_min = settings.session.renew_threshold_min,
		keepalive_secs = settings.session.keepalive_period.as_secs(),
		"starting slip proxy"
	);

	let state = AppState::new(session, upstream, settings.health_probe.clone());
	server::serve(state, bind).await
}
