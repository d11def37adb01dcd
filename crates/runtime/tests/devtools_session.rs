//! Drives `ChromeBrowser` against an in-process fake DevTools websocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use slipcheck_runtime::{AutomationError, AutomationPage, BrowserAutomation, ChromeBrowser};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

struct FakeDevtools {
	ws_url: String,
	methods: Arc<Mutex<Vec<String>>>,
}

/// Accepts one websocket client and answers the commands the runtime sends.
/// The cookie presence check starts returning `true` after `cookies_ready_after` polls.
async fn spawn_fake_devtools(cookies_ready_after: usize) -> FakeDevtools {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let methods = Arc::new(Mutex::new(Vec::new()));
	let cookie_polls = Arc::new(AtomicUsize::new(0));

	let recorded = Arc::clone(&methods);
	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

		while let Some(Ok(message)) = ws.next().await {
			let Message::Text(text) = message else {
				continue;
			};
			let request: Value = serde_json::from_str(&text).unwrap();
			let method = request["method"].as_str().unwrap_or_default().to_string();
			recorded.lock().push(method.clone());

			let mut reply = match method.as_str() {
				"Storage.getCookies" => json!({"result": {"cookies": [
					{"name": "cf_clearance", "value": "c1", "domain": ".example.test", "path": "/", "expires": -1, "httpOnly": true, "secure": true},
					{"name": "SERVERID", "value": "s1", "domain": "www.example.test", "path": "/", "expires": -1},
					{"name": "tracker", "value": "t", "domain": "elsewhere.test", "path": "/", "expires": -1},
				]}}),
				"Target.createTarget" => json!({"result": {"targetId": "T1"}}),
				"Target.attachToTarget" => json!({"result": {"sessionId": "S1"}}),
				"Page.navigate" => {
					let url = request["params"]["url"].as_str().unwrap_or_default();
					if url.contains("unreachable") {
						json!({"result": {"frameId": "F1", "errorText": "net::ERR_NAME_NOT_RESOLVED"}})
					} else {
						json!({"result": {"frameId": "F1"}})
					}
				}
				"Runtime.evaluate" => {
					let expression = request["params"]["expression"].as_str().unwrap_or_default();
					let value = if expression.contains("document.cookie") {
						cookie_polls.fetch_add(1, Ordering::SeqCst) + 1 >= cookies_ready_after
					} else {
						true
					};
					json!({"result": {"result": {"type": "boolean", "value": value}}})
				}
				"Target.closeTarget" => json!({"result": {"success": true}}),
				_ => json!({"error": {"code": -32601, "message": format!("'{method}' wasn't found")}}),
			};
			reply["id"] = request["id"].clone();
			if let Some(session_id) = request.get("sessionId") {
				reply["sessionId"] = session_id.clone();
			}

			if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
				break;
			}
		}
	});

	FakeDevtools {
		ws_url: format!("ws://{}/devtools/browser/fake", addr),
		methods,
	}
}

async fn connect(fake: &FakeDevtools) -> ChromeBrowser {
	ChromeBrowser::connect(&fake.ws_url, None, Duration::from_secs(5)).await.unwrap()
}

#[tokio::test]
async fn cookies_are_scoped_to_origin_in_browser_order() {
	let fake = spawn_fake_devtools(1).await;
	let browser = connect(&fake).await;

	let jar = browser.cookies(&Url::parse("https://www.example.test/betslipbrowser").unwrap()).await.unwrap();
	assert_eq!(jar.to_header(), "cf_clearance=c1; SERVERID=s1");
	assert!(browser.profile_dir().is_none());
}

#[tokio::test]
async fn renewal_page_navigates_waits_and_closes() {
	let fake = spawn_fake_devtools(3).await;
	let browser = connect(&fake).await;

	let mut page = browser.new_page().await.unwrap();
	page.goto("https://www.example.test/betslipbrowser", Duration::from_secs(5)).await.unwrap();
	page.wait_for_cookies(&["cf_clearance".to_string(), "SERVERID".to_string()], Duration::from_secs(5))
		.await
		.unwrap();
	page.close().await.unwrap();

	let methods = fake.methods.lock().clone();
	assert_eq!(methods[0], "Target.createTarget");
	assert_eq!(methods[1], "Target.attachToTarget");
	assert_eq!(methods[2], "Page.navigate");
	assert_eq!(methods.iter().filter(|m| m.as_str() == "Runtime.evaluate").count(), 4);
	assert_eq!(methods.last().map(String::as_str), Some("Target.closeTarget"));
}

#[tokio::test]
async fn cookie_wait_times_out_when_cookies_never_appear() {
	let fake = spawn_fake_devtools(usize::MAX).await;
	let browser = connect(&fake).await;

	let mut page = browser.new_page().await.unwrap();
	let err = page
		.wait_for_cookies(&["cf_clearance".to_string()], Duration::from_millis(300))
		.await
		.unwrap_err();
	assert!(err.is_timeout(), "unexpected error: {err}");
}

#[tokio::test]
async fn navigation_error_text_is_reported() {
	let fake = spawn_fake_devtools(1).await;
	let browser = connect(&fake).await;

	let mut page = browser.new_page().await.unwrap();
	let err = page.goto("https://unreachable.example.test/", Duration::from_secs(5)).await.unwrap_err();
	match err {
		AutomationError::Navigation { url, reason } => {
			assert_eq!(url, "https://unreachable.example.test/");
			assert_eq!(reason, "net::ERR_NAME_NOT_RESOLVED");
		}
		other => panic!("unexpected error: {other}"),
	}
}

#[tokio::test]
async fn closing_an_attached_browser_leaves_it_running() {
	let fake = spawn_fake_devtools(1).await;
	let browser = connect(&fake).await;

	browser.close().await.unwrap();
	assert!(fake.methods.lock().is_empty());
}
