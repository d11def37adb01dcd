//! DevTools endpoint probing.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AutomationError, Result};

/// `/json/version` response subset from the DevTools HTTP endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "User-Agent")]
	pub user_agent: Option<String>,
}

/// Resolves DevTools version metadata from `/json/version` on `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|e| AutomationError::Endpoint(format!("Failed to create HTTP client: {}", e)))?;
	let mut last_error = "no response".to_string();

	for url in [format!("http://127.0.0.1:{}/json/version", port), format!("http://localhost:{}/json/version", port)] {
		let response = match client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				last_error = e.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		let info: CdpVersionInfo = response
			.json()
			.await
			.map_err(|e| AutomationError::Endpoint(format!("Failed to parse DevTools response: {}", e)))?;
		return Ok(info);
	}

	Err(AutomationError::Endpoint(format!("port {}: {}", port, last_error)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_info_parses_chrome_field_names() {
		let json = r#"{
			"Browser": "Chrome/142.0.0.0",
			"Protocol-Version": "1.3",
			"User-Agent": "Mozilla/5.0",
			"webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
		}"#;
		let info: CdpVersionInfo = serde_json::from_str(json).unwrap();
		assert_eq!(info.web_socket_debugger_url, "ws://127.0.0.1:9222/devtools/browser/abc");
		assert_eq!(info.browser.as_deref(), Some("Chrome/142.0.0.0"));
	}

	#[tokio::test]
	async fn closed_port_reports_endpoint_error() {
		let port = crate::process::free_port().unwrap();
		let err = fetch_cdp_endpoint(port).await.unwrap_err();
		assert!(matches!(err, AutomationError::Endpoint(_)), "unexpected error: {err}");
	}
}
