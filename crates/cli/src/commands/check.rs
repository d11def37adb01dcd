use crate::check::{check_ticket, normalize_ticket};
use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, print_result};
use crate::upstream::UpstreamClient;

/// One lookup through the same flow as `/api/check`.
pub async fn execute(settings: &Settings, ticket: &str, debug: bool, format: OutputFormat) -> Result<()> {
	let code = normalize_ticket(ticket)?;
	let upstream = UpstreamClient::new(settings.upstream.clone())?;
	let session = super::session_manager(settings)?;

	let outcome = check_ticket(&session, &upstream, &code).await;
	session.close().await;

	print_result(format, &outcome?.into_response(debug))
}
