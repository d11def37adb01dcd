use super::StatusReport;
use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, print_result};
use crate::session::RenewalReason;

pub async fn execute(settings: &Settings, format: OutputFormat) -> Result<()> {
	let session = super::session_manager(settings)?;
	session.renew(RenewalReason::Forced).await;
	let status = session.try_status().await;
	let report = status.map(|status| StatusReport::new(&session, status));
	session.close().await;

	print_result(format, &report?)
}
