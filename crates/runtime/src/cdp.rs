//! DevTools protocol websocket connection.
//!
//! One browser-level websocket carries every command; page targets are
//! addressed through flattened `sessionId`s. Responses are correlated to
//! callers by request id; events are not consumed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{AutomationError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CdpRequest<'a> {
	id: u64,
	method: &'a str,
	params: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdpMessage {
	id: Option<u64>,
	result: Option<Value>,
	error: Option<CdpErrorBody>,
	method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
	code: i64,
	message: String,
}

/// Browser-level DevTools connection.
pub struct CdpConnection {
	ws_tx: tokio::sync::Mutex<WsSink>,
	request_id: AtomicU64,
	pending: PendingMap,
	command_timeout: Duration,
	recv_task: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
	/// Connects to a browser websocket URL such as `ws://127.0.0.1:9222/devtools/browser/<id>`.
	pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
		let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
		let (ws_sink, ws_source) = ws_stream.split();
		let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

		let recv_task = {
			let pending = Arc::clone(&pending);
			tokio::spawn(async move { receive_loop(ws_source, pending).await })
		};

		debug!(target = "slipcheck.cdp", %ws_url, "devtools connected");

		Ok(Self {
			ws_tx: tokio::sync::Mutex::new(ws_sink),
			request_id: AtomicU64::new(1),
			pending,
			command_timeout,
			recv_task,
		})
	}

	/// Sends a command and waits for its response.
	///
	/// `session_id` targets an attached page; `None` addresses the browser.
	pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		let id = self.request_id.fetch_add(1, Ordering::SeqCst);
		let payload = serde_json::to_string(&CdpRequest {
			id,
			method,
			params,
			session_id,
		})?;
		trace!(target = "slipcheck.cdp", %payload, "send");

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let sent = {
			let mut ws = self.ws_tx.lock().await;
			ws.send(Message::Text(payload.into())).await
		};
		if let Err(err) = sent {
			self.pending.lock().remove(&id);
			return Err(err.into());
		}

		match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(AutomationError::SessionClosed),
			Err(_) => {
				self.pending.lock().remove(&id);
				Err(AutomationError::Timeout {
					ms: self.command_timeout.as_millis() as u64,
					condition: format!("{method} response"),
				})
			}
		}
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		self.recv_task.abort();
	}
}

async fn receive_loop(mut ws_source: WsSource, pending: PendingMap) {
	while let Some(msg) = ws_source.next().await {
		match msg {
			Ok(Message::Text(text)) => dispatch(&text, &pending),
			Ok(Message::Close(_)) => {
				debug!(target = "slipcheck.cdp", "devtools websocket closed");
				break;
			}
			Err(err) => {
				warn!(target = "slipcheck.cdp", error = %err, "devtools websocket error");
				break;
			}
			_ => {}
		}
	}

	// Dropping the senders fails every outstanding call with `SessionClosed`.
	pending.lock().clear();
}

fn dispatch(text: &str, pending: &PendingMap) {
	let message: CdpMessage = match serde_json::from_str(text) {
		Ok(message) => message,
		Err(err) => {
			warn!(target = "slipcheck.cdp", error = %err, "unparseable devtools message");
			return;
		}
	};

	let Some(id) = message.id else {
		if let Some(method) = message.method {
			trace!(target = "slipcheck.cdp", %method, "event ignored");
		}
		return;
	};

	let Some(tx) = pending.lock().remove(&id) else {
		return;
	};

	let result = match message.error {
		Some(error) => Err(AutomationError::Protocol {
			code: error.code,
			message: error.message,
		}),
		None => Ok(message.result.unwrap_or(Value::Null)),
	};
	let _ = tx.send(result);
}
