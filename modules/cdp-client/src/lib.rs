pub mod error;

pub use error::{CdpError, Result};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Subset of the `/json/version` discovery document.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser", default)]
    browser: Option<String>,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

struct Inner {
    sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Browser-level DevTools connection. Cheap to clone; all clones share one
/// websocket and one background reader task.
#[derive(Clone)]
pub struct CdpClient {
    inner: Arc<Inner>,
}

impl CdpClient {
    /// Attach to a running browser through its remote debugging endpoint,
    /// e.g. `http://localhost:9222`.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()?;

        let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
        let resp = http.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CdpError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let version: VersionInfo = resp.json().await?;
        info!(
            endpoint,
            browser = version.browser.as_deref().unwrap_or("unknown"),
            "cdp: attaching to browser"
        );

        Self::connect_websocket(&version.web_socket_debugger_url).await
    }

    /// Connect directly to a browser websocket URL, skipping discovery.
    pub async fn connect_websocket(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url).await?;
        let (sink, source) = stream.split();

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_frames(source, pending.clone(), closed.clone()));

        Ok(Self {
            inner: Arc::new(Inner {
                sink: tokio::sync::Mutex::new(sink),
                pending,
                closed,
                next_id: AtomicU64::new(1),
                reader,
            }),
        })
    }

    /// Send one command and wait for its reply. `session_id` routes the
    /// command to an attached target (flattened sessions).
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<Value> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(CdpError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut command = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            command["sessionId"] = Value::String(session_id.to_string());
        }

        let (tx, rx) = oneshot::channel();
        register(&self.inner.pending, &self.inner.closed, id, tx)?;

        debug!(id, method, "cdp: sending command");
        let sent = self
            .inner
            .sink
            .lock()
            .await
            .send(Message::text(command.to_string()))
            .await;
        if let Err(e) = sent {
            lock(&self.inner.pending).remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(CdpError::Closed),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                Err(CdpError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Open a new tab in the browser's default context and attach to it.
    pub async fn open_page(&self) -> Result<CdpPage> {
        let created = self
            .call("Target.createTarget", json!({ "url": "about:blank" }), None)
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = self
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;

        debug!(target_id = %target_id, session_id = %session_id, "cdp: page attached");

        Ok(CdpPage {
            client: self.clone(),
            target_id,
            session_id,
        })
    }

    /// Close the websocket. Commands still in flight fail with `Closed`.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        let result = self.inner.sink.lock().await.close().await;
        self.inner.reader.abort();
        fail_pending(&self.inner.pending);

        match result {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One attached page target.
pub struct CdpPage {
    client: CdpClient,
    target_id: String,
    session_id: String,
}

impl CdpPage {
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.client.call(method, params, Some(&self.session_id)).await
    }

    /// Start navigation. Returns once the browser has accepted the request,
    /// not when the page has finished loading.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let reply = self.call("Page.navigate", json!({ "url": url })).await?;

        match reply.get("errorText").and_then(Value::as_str) {
            Some(message) if !message.is_empty() => Err(CdpError::Navigation {
                url: url.to_string(),
                message: message.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Evaluate a JavaScript expression in the page and return its value
    /// serialized by the browser. Promises are awaited.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let reply = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = reply.get("exceptionDetails") {
            return Err(CdpError::Evaluation(describe_exception(details)));
        }

        Ok(reply
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn evaluate_as<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let value = self.evaluate(expression).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Close the tab. The browser connection stays open.
    pub async fn close(self) -> Result<()> {
        self.client
            .call(
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
                None,
            )
            .await?;
        Ok(())
    }
}

async fn read_frames(mut source: SplitStream<WsStream>, pending: Pending, closed: Arc<AtomicBool>) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => route_frame(&pending, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "cdp: websocket read failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    fail_pending(&pending);
}

/// Hand a reply to the caller waiting on its id. Events are only traced.
fn route_frame(pending: &Pending, frame: &str) {
    let message: Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "cdp: undecodable frame");
            return;
        }
    };

    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        if let Some(method) = message.get("method").and_then(Value::as_str) {
            debug!(method, "cdp: event");
        }
        return;
    };

    let Some(waiter) = lock(pending).remove(&id) else {
        debug!(id, "cdp: reply for unknown command");
        return;
    };

    let reply = match message.get("error") {
        Some(error) => Err(CdpError::Protocol {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
        None => Ok(message.get("result").cloned().unwrap_or_else(|| json!({}))),
    };

    let _ = waiter.send(reply);
}

/// Park a reply sender under its command id. The closed flag is checked
/// again after the insert: a reader that exited in between has already
/// drained the map and would never answer.
fn register(
    pending: &Pending,
    closed: &AtomicBool,
    id: u64,
    tx: oneshot::Sender<Result<Value>>,
) -> Result<()> {
    lock(pending).insert(id, tx);
    if closed.load(Ordering::Acquire) {
        lock(pending).remove(&id);
        return Err(CdpError::Closed);
    }
    Ok(())
}

fn fail_pending(pending: &Pending) {
    for (_, waiter) in lock(pending).drain() {
        let _ = waiter.send(Err(CdpError::Closed));
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| CdpError::Decode(format!("missing `{field}` in {value}")))
}

fn describe_exception(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("unknown exception")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_with(id: u64) -> (Pending, oneshot::Receiver<Result<Value>>) {
        let pending: Pending = Arc::default();
        let (tx, rx) = oneshot::channel();
        lock(&pending).insert(id, tx);
        (pending, rx)
    }

    #[test]
    fn version_document_yields_websocket_url() {
        let body = r#"{
            "Browser": "Chrome/126.0.6478.126",
            "Protocol-Version": "1.3",
            "webSocketDebuggerUrl": "ws://localhost:9222/devtools/browser/abc"
        }"#;
        let version: VersionInfo = serde_json::from_str(body).unwrap();
        assert_eq!(
            version.web_socket_debugger_url,
            "ws://localhost:9222/devtools/browser/abc"
        );
        assert_eq!(version.browser.as_deref(), Some("Chrome/126.0.6478.126"));
    }

    #[test]
    fn register_after_reader_exit_fails_fast() {
        let pending: Pending = Arc::default();
        let closed = AtomicBool::new(false);

        // Reader exits: flag first, then drain.
        closed.store(true, Ordering::Release);
        fail_pending(&pending);

        let (tx, _rx) = oneshot::channel();
        let err = register(&pending, &closed, 9, tx).unwrap_err();
        assert!(matches!(err, CdpError::Closed));
        assert!(lock(&pending).is_empty());
    }

    #[test]
    fn register_on_open_connection_parks_sender() {
        let pending: Pending = Arc::default();
        let closed = AtomicBool::new(false);

        let (tx, _rx) = oneshot::channel();
        register(&pending, &closed, 4, tx).unwrap();
        assert!(lock(&pending).contains_key(&4));
    }

    #[test]
    fn reply_is_routed_to_waiting_command() {
        let (pending, mut rx) = pending_with(7);
        route_frame(&pending, r#"{"id":7,"result":{"targetId":"T1"}}"#);

        let reply = rx.try_recv().unwrap().unwrap();
        assert_eq!(reply["targetId"], "T1");
        assert!(lock(&pending).is_empty());
    }

    #[test]
    fn error_reply_becomes_protocol_error() {
        let (pending, mut rx) = pending_with(3);
        route_frame(
            &pending,
            r#"{"id":3,"error":{"code":-32000,"message":"No target with given id"}}"#,
        );

        match rx.try_recv().unwrap() {
            Err(CdpError::Protocol { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "No target with given id");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn events_and_unknown_ids_leave_waiters_alone() {
        let (pending, mut rx) = pending_with(1);
        route_frame(&pending, r#"{"method":"Page.loadEventFired","params":{}}"#);
        route_frame(&pending, r#"{"id":99,"result":{}}"#);
        route_frame(&pending, "not json");

        assert!(rx.try_recv().is_err());
        assert_eq!(lock(&pending).len(), 1);
    }

    #[test]
    fn closing_fails_outstanding_commands() {
        let (pending, mut rx) = pending_with(5);
        fail_pending(&pending);
        assert!(matches!(rx.try_recv().unwrap(), Err(CdpError::Closed)));
    }

    #[test]
    fn exception_description_preferred_over_text() {
        let details = json!({
            "text": "Uncaught",
            "exception": { "description": "TypeError: x is not a function" }
        });
        assert_eq!(describe_exception(&details), "TypeError: x is not a function");
        assert_eq!(describe_exception(&json!({ "text": "Uncaught" })), "Uncaught");
    }
}
