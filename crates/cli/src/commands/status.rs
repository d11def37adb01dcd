use super::StatusReport;
use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, print_result};

/// Prints the clearance derived from the profile's current cookies; never renews.
pub async fn execute(settings: &Settings, format: OutputFormat) -> Result<()> {
	let session = super::session_manager(settings)?;
	let status = session.try_status().await;
	let report = status.map(|status| StatusReport::new(&session, status));
	session.close().await;

	print_result(format, &report?)
}
