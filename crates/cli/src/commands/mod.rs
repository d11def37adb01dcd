mod check;
mod renew;
mod serve;
mod status;

use std::sync::Arc;

use serde::Serialize;
use slipcheck_runtime::ChromeLauncher;

use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::error::Result;
use crate::session::{ClearanceStatus, SessionManager};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let settings = Settings::from_args(&cli.session)?;
	let format = cli.format;

	match cli.command {
		Commands::Serve { bind } => serve::execute(&settings, bind).await,
		Commands::Status => status::execute(&settings, format).await,
		Commands::Renew => renew::execute(&settings, format).await,
		Commands::Check { ticket, debug } => check::execute(&settings, &ticket, debug, format).await,
	}
}

/// Session manager backed by a real browser.
fn session_manager(settings: &Settings) -> Result<SessionManager> {
	let launcher = Arc::new(ChromeLauncher::new(settings.launch.clone()));
	SessionManager::new(settings.session.clone(), launcher)
}

/// Printed by `status` and `renew`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
	#[serde(flatten)]
	status: ClearanceStatus,
	profile_dir: Option<String>,
	renewals: u64,
}

impl StatusReport {
	fn new(session: &SessionManager, status: ClearanceStatus) -> Self {
		Self {
			status,
			profile_dir: session.profile_dir().map(|dir| dir.display().to_string()),
			renewals: session.renewals_started(),
		}
	}
}
