//! End-to-end `/api/check` and `/api/health` against an in-process sportsbook.
//!
//! The sportsbook rejects any request without the cookie its ping page issues;
//! the fake browser "visits" that page by installing the cookie in its jar.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::Mutex;
use serde_json::{Value, json};
use slipcheck_cli::config::{HealthProbe, SessionConfig, UpstreamConfig};
use slipcheck_cli::server::{AppState, router};
use slipcheck_cli::session::SessionManager;
use slipcheck_cli::upstream::UpstreamClient;
use slipcheck_protocol::{Cookie, CookieJar};
use slipcheck_runtime::{AutomationLauncher, AutomationPage, BrowserAutomation};
use tempfile::TempDir;
use url::Url;

const CLEARANCE: &str = "cf_clearance=issued-by-ping";

#[derive(Default)]
struct Sportsbook {
	slip_calls: AtomicUsize,
}

async fn slip(State(book): State<Arc<Sportsbook>>, UrlPath(code): UrlPath<String>, headers: HeaderMap) -> Response {
	book.slip_calls.fetch_add(1, Ordering::SeqCst);
	let cookie = headers.get("cookie").and_then(|v| v.to_str().ok()).unwrap_or_default();
	if !cookie.contains(CLEARANCE) {
		return (StatusCode::FORBIDDEN, "Attention Required!").into_response();
	}
	axum::Json(json!({"code": code, "legs": [{"result": "won"}]})).into_response()
}

async fn spawn_sportsbook() -> (Url, Arc<Sportsbook>) {
	let book = Arc::new(Sportsbook::default());
	let app = Router::new()
		.route("/betslipbrowser", get(|| async { "ok" }))
		.route("/API/betting/fo/bets/code/{code}", get(slip))
		.with_state(Arc::clone(&book));

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move { axum::serve(listener, app).await });
	(Url::parse(&format!("http://{addr}")).unwrap(), book)
}

/// Browser double whose navigation to the ping page yields clearance cookies.
struct ScriptedBrowser {
	jar: Mutex<CookieJar>,
	navigations: AtomicUsize,
	profile: std::path::PathBuf,
}

struct ScriptedLauncher(Arc<ScriptedBrowser>);

#[async_trait]
impl AutomationLauncher for ScriptedLauncher {
	async fn launch(&self) -> slipcheck_runtime::Result<Arc<dyn BrowserAutomation>> {
		Ok(Arc::new(SharedBrowser(Arc::clone(&self.0))))
	}
}

struct SharedBrowser(Arc<ScriptedBrowser>);

#[async_trait]
impl BrowserAutomation for SharedBrowser {
	async fn cookies(&self, _url: &Url) -> slipcheck_runtime::Result<CookieJar> {
		Ok(self.0.jar.lock().clone())
	}

	async fn new_page(&self) -> slipcheck_runtime::Result<Box<dyn AutomationPage>> {
		Ok(Box::new(ScriptedPage(Arc::clone(&self.0))))
	}

	fn profile_dir(&self) -> Option<&Path> {
		Some(&self.0.profile)
	}
}

struct ScriptedPage(Arc<ScriptedBrowser>);

#[async_trait]
impl AutomationPage for ScriptedPage {
	async fn goto(&mut self, url: &str, _timeout: Duration) -> slipcheck_runtime::Result<()> {
		assert!(url.ends_with("/betslipbrowser"), "renewal navigated to {url}");
		self.0.navigations.fetch_add(1, Ordering::SeqCst);
		let (name, value) = CLEARANCE.split_once('=').unwrap();
		*self.0.jar.lock() = CookieJar::new(vec![Cookie::new(name, value), Cookie::new("SERVERID", "app-1")]);
		Ok(())
	}

	async fn wait_for_cookies(&mut self, names: &[String], _timeout: Duration) -> slipcheck_runtime::Result<()> {
		assert!(self.0.jar.lock().contains_all(names));
		Ok(())
	}

	async fn close(self: Box<Self>) -> slipcheck_runtime::Result<()> {
		Ok(())
	}
}

struct Proxy {
	base: String,
	browser: Arc<ScriptedBrowser>,
	book: Arc<Sportsbook>,
	session: SessionManager,
	_profile: TempDir,
}

async fn spawn_proxy(initial_jar: CookieJar) -> Proxy {
	let (origin, book) = spawn_sportsbook().await;
	let profile = TempDir::new().unwrap();
	let browser = Arc::new(ScriptedBrowser {
		jar: Mutex::new(initial_jar),
		navigations: AtomicUsize::new(0),
		profile: profile.path().to_path_buf(),
	});

	let session_config = SessionConfig {
		origin: origin.clone(),
		settle: Duration::from_millis(10),
		..SessionConfig::default()
	};
	let session = SessionManager::new(session_config, Arc::new(ScriptedLauncher(Arc::clone(&browser)))).unwrap();
	let upstream = UpstreamClient::new(UpstreamConfig {
		origin: origin.clone(),
		..UpstreamConfig::default()
	})
	.unwrap();

	let mut ping = origin.clone();
	ping.set_path("/betslipbrowser");
	let state = AppState::new(session.clone(), Arc::new(upstream), HealthProbe::Fetch(ping));

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move { axum::serve(listener, router(state)).await });

	Proxy {
		base: format!("http://{addr}"),
		browser,
		book,
		session,
		_profile: profile,
	}
}

async fn get_json(url: String) -> (u16, Value) {
	let response = reqwest::get(url).await.unwrap();
	let status = response.status().as_u16();
	(status, response.json().await.unwrap())
}

#[tokio::test]
async fn stale_cookie_is_renewed_after_rejection() {
	let stale = CookieJar::new(vec![Cookie::new("cf_clearance", "expired"), Cookie::new("SERVERID", "app-1")]);
	let proxy = spawn_proxy(stale).await;

	let (status, body) = get_json(format!("{}/api/check?ticket=1234 5678 9012 34&debug=true", proxy.base)).await;
	assert_eq!(status, 200);
	assert_eq!(body["status"], 200);
	assert_eq!(body["data"]["code"], "12345678901234");
	assert_eq!(body["meta"]["attempts"], 2);
	assert_eq!(proxy.book.slip_calls.load(Ordering::SeqCst), 2);
	assert_eq!(proxy.browser.navigations.load(Ordering::SeqCst), 1);

	// The renewed cookie is reused without another navigation.
	let (_, body) = get_json(format!("{}/api/check?code=12345678901234", proxy.base)).await;
	assert_eq!(body["status"], 200);
	assert_eq!(proxy.book.slip_calls.load(Ordering::SeqCst), 3);
	assert_eq!(proxy.browser.navigations.load(Ordering::SeqCst), 1);
	assert_eq!(proxy.session.renewals_started(), 1);
}

#[tokio::test]
async fn invalid_ticket_never_reaches_sportsbook() {
	let proxy = spawn_proxy(CookieJar::default()).await;

	let (status, body) = get_json(format!("{}/api/check?ticket=42", proxy.base)).await;
	assert_eq!(status, 400);
	assert_eq!(body, json!({"status": 400, "error": "ticket must be exactly 14 digits (got \"42\")"}));
	assert_eq!(proxy.book.slip_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_probe_renews_missing_clearance() {
	let proxy = spawn_proxy(CookieJar::default()).await;

	let (status, body) = get_json(format!("{}/api/health", proxy.base)).await;
	assert_eq!(status, 200);
	assert_eq!(body["ok"], true);
	assert_eq!(body["hasClearance"], true);
	assert_eq!(body["minutesLeft"], 55);
	assert_eq!(body["profileDir"], proxy.browser.profile.display().to_string());
	assert_eq!(proxy.browser.navigations.load(Ordering::SeqCst), 1);
}
