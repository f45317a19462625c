//! mpv JSON IPC client: line-delimited requests and events over a Unix socket
//!
//! mpv creates the socket shortly after launch, so connecting polls until the
//! startup timeout elapses. One reader task per connection routes responses
//! to pending requests by `request_id` and forwards asynchronous events.

use crate::error::{Error, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Asynchronous notifications decoded from the mpv event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcEvent {
    /// `end-file` with reason `eof`: the media played to its natural end
    EndOfFile,
    /// `property-change` on the observed `pause` property
    PauseChanged(bool),
}

/// Persistent JSON IPC connection to one mpv process
pub struct IpcClient {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl IpcClient {
    /// Connect to the socket at `path`, polling until `startup_timeout` elapses.
    ///
    /// Decoded [`IpcEvent`]s are forwarded through `events` until the
    /// connection closes.
    pub async fn connect(
        path: &Path,
        startup_timeout: Duration,
        events: mpsc::Sender<IpcEvent>,
    ) -> Result<Self> {
        let deadline = Instant::now() + startup_timeout;
        let stream = loop {
            match UnixStream::connect(path).await {
                Ok(stream) => break stream,
                Err(err) if Instant::now() < deadline => {
                    tracing::trace!("Control socket not ready yet: {err}");
                    sleep(CONNECT_POLL_INTERVAL).await;
                }
                Err(err) => {
                    return Err(Error::Ipc(format!(
                        "Control socket {} never became ready: {err}",
                        path.display()
                    )));
                }
            }
        };

        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = Arc::clone(&pending);

        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Ok(message) = serde_json::from_str::<Value>(&line) {
                            route_message(message, &reader_pending, &events).await;
                        } else {
                            tracing::debug!(%line, "Unparseable IPC line");
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!("IPC read error: {err}");
                        break;
                    }
                }
            }
            // Wake any requests still waiting on a reply
            reader_pending.lock().expect("pending lock").clear();
        });

        Ok(Self {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
        })
    }

    /// Send one command array and wait for its matching response.
    ///
    /// Returns the response's `data` field on success.
    pub async fn request(&self, command: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "command": command, "request_id": id });
        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("pending lock").insert(id, tx);

        {
            let mut writer = self.writer.lock().await;
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                self.pending.lock().expect("pending lock").remove(&id);
                return Err(Error::Ipc(format!("Failed to send command: {err}")));
            }
        }

        let response = match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(Error::Ipc("Connection closed awaiting reply".to_string())),
            Err(_) => {
                self.pending.lock().expect("pending lock").remove(&id);
                return Err(Error::Ipc("Timed out awaiting reply".to_string()));
            }
        };

        match response.get("error").and_then(Value::as_str) {
            Some("success") => Ok(response.get("data").cloned().unwrap_or(Value::Null)),
            Some(other) => Err(Error::Ipc(format!("Engine rejected command: {other}"))),
            None => Err(Error::Ipc("Malformed engine response".to_string())),
        }
    }

    /// Subscribe to change notifications for an mpv property.
    pub async fn observe_property(&self, name: &str) -> Result<()> {
        self.request(json!(["observe_property", 1, name])).await?;
        Ok(())
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn route_message(message: Value, pending: &PendingMap, events: &mpsc::Sender<IpcEvent>) {
    if let Some(event) = message.get("event").and_then(Value::as_str) {
        let decoded = match event {
            "end-file" => {
                // Only a natural end counts; stop/quit reasons are the result
                // of our own termination and must not loop back as events.
                let reason = message.get("reason").and_then(Value::as_str);
                (reason == Some("eof")).then_some(IpcEvent::EndOfFile)
            }
            "property-change" => {
                let name = message.get("name").and_then(Value::as_str);
                let value = message.get("data").and_then(Value::as_bool);
                match (name, value) {
                    (Some("pause"), Some(paused)) => Some(IpcEvent::PauseChanged(paused)),
                    _ => None,
                }
            }
            _ => None,
        };

        if let Some(decoded) = decoded {
            let _ = events.send(decoded).await;
        }
        return;
    }

    if let Some(id) = message.get("request_id").and_then(Value::as_u64) {
        let sender = pending.lock().expect("pending lock").remove(&id);
        if let Some(sender) = sender {
            let _ = sender.send(message);
        } else {
            tracing::debug!(request_id = id, "Reply for unknown request");
        }
    }
}
