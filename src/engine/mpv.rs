//! mpv process lifecycle and session management

use crate::config::EngineOptions;
use crate::controller::PlayerEvent;
use crate::engine::ipc::{IpcClient, IpcEvent};
use crate::engine::{EngineEvent, EngineRequest, PlaybackEngine};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Capacity of the per-session channel bridging IPC events to the controller queue
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One running mpv process with its control channel
struct Session {
    id: u64,
    ipc: IpcClient,
    kill: Option<oneshot::Sender<()>>,
    exited: oneshot::Receiver<Option<i32>>,
}

/// Drives mpv as the external playback engine.
///
/// Each launched path gets its own mpv process; switching media replaces the
/// session wholesale, so playback always starts from the beginning.
pub struct MpvEngine {
    options: EngineOptions,
    events: mpsc::Sender<PlayerEvent>,
    session: Option<Session>,
    next_session: u64,
}

impl MpvEngine {
    /// Create an engine client that queues notifications into `events`.
    pub fn new(options: EngineOptions, events: mpsc::Sender<PlayerEvent>) -> Self {
        Self {
            options,
            events,
            session: None,
            next_session: 1,
        }
    }

    fn spawn_process(&self, path: &Path) -> Result<Child> {
        let mut command = Command::new(&self.options.binary);
        command
            .arg(format!(
                "--input-ipc-server={}",
                self.options.socket.display()
            ))
            .arg("--force-window=yes")
            .arg("--no-osc")
            .arg("--no-input-default-bindings")
            .arg("--cursor-autohide=always")
            .arg("--image-display-duration=inf")
            .arg("--really-quiet");
        if self.options.fullscreen {
            command.arg("--fullscreen=yes");
        }
        for arg in &self.options.extra_args {
            command.arg(arg);
        }
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        command.spawn().map_err(|e| {
            Error::EngineLaunch(format!("Failed to spawn '{}': {e}", self.options.binary))
        })
    }

    /// Bridge decoded IPC events into the controller queue, stamped with the session id.
    fn bridge_events(&self, id: u64, mut ipc_rx: mpsc::Receiver<IpcEvent>) {
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(ipc_event) = ipc_rx.recv().await {
                let event = match ipc_event {
                    IpcEvent::EndOfFile => EngineEvent::EndOfFile,
                    IpcEvent::PauseChanged(paused) => EngineEvent::PauseChanged(paused),
                };
                if events
                    .send(PlayerEvent::Engine { session: id, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    /// Wait for the child to exit, reporting the exit through both the
    /// controller queue and the session's `exited` channel.
    fn watch_exit(
        &self,
        id: u64,
        child: Child,
        kill_rx: oneshot::Receiver<()>,
        exit_tx: oneshot::Sender<Option<i32>>,
    ) {
        tokio::spawn(watch_exit_task(id, child, kill_rx, exit_tx, self.events.clone()));
    }
}

/// Body of the per-session exit watcher.
///
/// `exit_tx` must fire before the controller-queue send: `terminate()` awaits
/// it from inside the controller's own event handling, so a full queue would
/// otherwise deadlock the termination path.
async fn watch_exit_task(
    id: u64,
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
    exit_tx: oneshot::Sender<Option<i32>>,
    events: mpsc::Sender<PlayerEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            tracing::warn!("Engine did not exit in time, killing");
            let _ = child.start_kill();
            child.wait().await
        }
    };

    let code = status.ok().and_then(|s| s.code());
    tracing::debug!(session = id, ?code, "Engine process exited");
    let _ = exit_tx.send(code);
    let _ = events
        .send(PlayerEvent::Engine {
            session: id,
            event: EngineEvent::Exited(code),
        })
        .await;
}

#[async_trait]
impl PlaybackEngine for MpvEngine {
    async fn launch(&mut self, path: &Path) -> Result<()> {
        self.terminate().await?;

        let id = self.next_session;
        self.next_session += 1;

        // mpv refuses to bind an existing socket file
        match tokio::fs::remove_file(&self.options.socket).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::EngineLaunch(format!(
                    "Failed to remove stale socket {}: {err}",
                    self.options.socket.display()
                )));
            }
        }

        tracing::info!(session = id, path = %path.display(), "Launching engine");
        let mut child = self.spawn_process(path)?;

        let (ipc_tx, ipc_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let startup_timeout = Duration::from_secs(self.options.startup_timeout_secs);
        let ipc = match IpcClient::connect(&self.options.socket, startup_timeout, ipc_tx).await {
            Ok(ipc) => ipc,
            Err(err) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(Error::EngineLaunch(err.to_string()));
            }
        };

        if let Err(err) = ipc.observe_property("pause").await {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(Error::EngineLaunch(format!(
                "Failed to observe pause property: {err}"
            )));
        }

        self.bridge_events(id, ipc_rx);

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        self.watch_exit(id, child, kill_rx, exit_tx);

        self.session = Some(Session {
            id,
            ipc,
            kill: Some(kill_tx),
            exited: exit_rx,
        });
        Ok(())
    }

    async fn send(&mut self, request: EngineRequest) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::NoActiveSession)?;

        let command = match request {
            EngineRequest::PauseToggle => json!(["cycle", "pause"]),
            EngineRequest::VolumeAdd(step) => json!(["add", "volume", step]),
            EngineRequest::MuteToggle => json!(["cycle", "mute"]),
            EngineRequest::Seek(seconds) => json!(["seek", seconds, "relative"]),
        };

        session.ipc.request(command).await?;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        tracing::info!(session = session.id, "Terminating engine session");

        // The reply may never arrive if the process dies mid-quit
        if let Err(err) = session.ipc.request(json!(["quit"])).await {
            tracing::debug!("Quit request failed: {err}");
        }

        let grace = Duration::from_secs(self.options.grace_secs);
        if timeout(grace, &mut session.exited).await.is_err() {
            if let Some(kill) = session.kill.take() {
                let _ = kill.send(());
            }
            if timeout(grace, &mut session.exited).await.is_err() {
                tracing::warn!(session = session.id, "Engine did not exit after kill");
            }
        }

        // Dropping the session drops the IPC client and its reader task
        Ok(())
    }

    fn is_current(&self, session: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A full controller queue must not delay the exit notification that
    // terminate() awaits, or killing a stuck engine would hang the player.
    #[tokio::test]
    async fn test_exit_signal_not_blocked_by_full_event_queue() {
        let (events_tx, _events_rx) = mpsc::channel(1);
        events_tx
            .send(PlayerEvent::Shutdown)
            .await
            .expect("fill the queue");

        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(watch_exit_task(7, child, kill_rx, exit_tx, events_tx));

        kill_tx.send(()).expect("deliver kill");

        // The queue is full and nobody drains it; the exit channel must
        // still resolve once the child is gone.
        timeout(Duration::from_secs(5), exit_rx)
            .await
            .expect("exit signal within the timeout")
            .expect("watcher reports the exit");
    }
}
