//! Playback engine client
//!
//! Owns the lifecycle and JSON IPC control channel of the external mpv
//! process. Exactly one session runs at a time; launching a new media path
//! replaces the previous session, and every session's asynchronous
//! notifications are stamped with its id so the controller can discard events
//! from sessions it has already replaced.

mod ipc;
mod mpv;

pub use ipc::{IpcClient, IpcEvent};
pub use mpv::MpvEngine;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Control requests the controller can issue against the active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRequest {
    /// Toggle pause/unpause
    PauseToggle,
    /// Adjust volume by a relative step in percent
    VolumeAdd(i32),
    /// Toggle mute
    MuteToggle,
    /// Seek by relative seconds (negative = backward)
    Seek(i64),
}

/// Asynchronous notifications emitted by the active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The media reached its natural end
    EndOfFile,
    /// The engine-reported pause flag changed
    PauseChanged(bool),
    /// The engine process exited, with its exit code when available
    Exited(Option<i32>),
}

/// Seam between the controller and the external playback process.
///
/// The production implementation is [`MpvEngine`]; tests drive the controller
/// with a recording mock instead.
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Start a new session rendering `path`, replacing any existing session.
    ///
    /// The previous process, if any, is terminated first; a session is never
    /// left orphaned. Returns once the control channel is ready, or
    /// [`crate::Error::EngineLaunch`] if it never became so.
    async fn launch(&mut self, path: &Path) -> Result<()>;

    /// Send a control request to the active session.
    ///
    /// Fails with [`crate::Error::NoActiveSession`] when nothing is running.
    async fn send(&mut self, request: EngineRequest) -> Result<()>;

    /// Gracefully shut down the active session, force-killing after the
    /// grace period. Idempotent: terminating with no session is a no-op.
    async fn terminate(&mut self) -> Result<()>;

    /// Whether `session` identifies the currently active session.
    ///
    /// Used by the controller to discard notifications queued by sessions
    /// that have since been replaced or terminated.
    fn is_current(&self, session: u64) -> bool;
}
