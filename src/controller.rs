//! The playback state machine
//!
//! A single controller task consumes one serialized queue of scans, synthetic
//! key commands, engine notifications, and shutdown signals. No two
//! transitions ever run concurrently, so playback state needs no locking.

use crate::config::ScanplayConfig;
use crate::engine::{EngineEvent, EngineRequest, PlaybackEngine};
use crate::error::{Error, Result};
use crate::media::MediaLibrary;
use crate::token::{Classified, Classifier, Command};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Events consumed by the controller, merged from all input sources
#[derive(Debug)]
pub enum PlayerEvent {
    /// A completed scan token from the scanner or the stdin diagnostic mode
    Scan(String),
    /// A synthetic command bypassing the token pipeline (keyboard Q/ESC)
    Key(Command),
    /// A notification from one engine session
    Engine {
        /// Id of the session that produced the event
        session: u64,
        /// The notification itself
        event: EngineEvent,
    },
    /// SIGINT/SIGTERM received, shut down cleanly
    Shutdown,
}

/// The controller's authoritative playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Splash asset shown, nothing meaningful playing
    Idle,
    /// Launch requested, control channel not yet ready
    Loading,
    /// Media playing
    Playing,
    /// Media paused
    Paused,
}

/// Whether the event loop should keep running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep consuming events
    Continue,
    /// Exit was requested, stop the loop
    Exit,
}

/// Orchestrates token classification, media resolution, and engine control
pub struct Controller {
    state: PlaybackState,
    classifier: Classifier,
    library: MediaLibrary,
    engine: Box<dyn PlaybackEngine>,
    splash: PathBuf,
    volume_step: i32,
    seek_step: i64,
}

impl Controller {
    /// Create a controller over the given engine client.
    pub fn new(config: &ScanplayConfig, engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            state: PlaybackState::Idle,
            classifier: Classifier::new(Duration::from_millis(config.playback.debounce_ms)),
            library: MediaLibrary::new(&config.media),
            engine,
            splash: config.media.splash.clone(),
            volume_step: config.playback.volume_step,
            seek_step: config.playback.seek_step_secs,
        }
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Show the splash and consume events until Exit or the queue closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<PlayerEvent>) -> Result<()> {
        self.show_splash().await?;

        while let Some(event) = events.recv().await {
            if self.handle(event).await? == Step::Exit {
                break;
            }
        }

        self.engine.terminate().await
    }

    /// Process one event, returning whether the loop should continue.
    ///
    /// Every runtime failure is handled here and converges back to the splash
    /// screen; only a failure to launch the splash itself propagates.
    pub async fn handle(&mut self, event: PlayerEvent) -> Result<Step> {
        match event {
            PlayerEvent::Scan(raw) => self.handle_scan(&raw).await,
            PlayerEvent::Key(command) => self.handle_command(command).await,
            PlayerEvent::Engine { session, event } => {
                if !self.engine.is_current(session) {
                    tracing::debug!(session, ?event, "Dropping event from stale session");
                    return Ok(Step::Continue);
                }
                self.handle_engine(event).await
            }
            PlayerEvent::Shutdown => {
                tracing::info!("Shutdown requested");
                self.engine.terminate().await?;
                Ok(Step::Exit)
            }
        }
    }

    /// Terminate any session and launch the splash asset.
    pub async fn show_splash(&mut self) -> Result<()> {
        self.state = PlaybackState::Loading;
        self.engine.launch(&self.splash).await?;
        self.state = PlaybackState::Idle;
        tracing::info!("Showing splash screen");
        Ok(())
    }

    async fn handle_scan(&mut self, raw: &str) -> Result<Step> {
        match self.classifier.classify(raw) {
            Some(Classified::Command(command)) => self.handle_command(command).await,
            Some(Classified::Media(reference)) => {
                match self.library.resolve(&reference) {
                    Ok(path) => self.play(path).await?,
                    Err(Error::MediaNotFound(_)) => {
                        tracing::warn!(%reference, "No media found for scan");
                    }
                    Err(err) => {
                        tracing::warn!(%reference, "Media lookup failed: {err}");
                    }
                }
                Ok(Step::Continue)
            }
            None => Ok(Step::Continue),
        }
    }

    /// Launch `path` in a fresh session. A failed launch is treated like a
    /// crash: log it and fall back to the splash.
    async fn play(&mut self, path: PathBuf) -> Result<()> {
        tracing::info!(path = %path.display(), "Playing");
        self.state = PlaybackState::Loading;
        match self.engine.launch(&path).await {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Engine launch failed: {err}");
                self.show_splash().await
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Step> {
        if command == Command::Exit {
            tracing::info!("Exit command received, shutting down");
            self.engine.terminate().await?;
            return Ok(Step::Exit);
        }

        if matches!(self.state, PlaybackState::Idle | PlaybackState::Loading) {
            tracing::debug!(command = command.as_str(), "Ignoring command while idle");
            return Ok(Step::Continue);
        }

        match command {
            Command::Pause => {
                if self.try_send(EngineRequest::PauseToggle).await {
                    self.state = match self.state {
                        PlaybackState::Playing => PlaybackState::Paused,
                        _ => PlaybackState::Playing,
                    };
                }
            }
            Command::Stop => {
                tracing::info!("Stopping playback");
                self.show_splash().await?;
            }
            Command::VolumeUp => {
                self.try_send(EngineRequest::VolumeAdd(self.volume_step)).await;
            }
            Command::VolumeDown => {
                self.try_send(EngineRequest::VolumeAdd(-self.volume_step)).await;
            }
            Command::Mute => {
                self.try_send(EngineRequest::MuteToggle).await;
            }
            Command::SeekForward => {
                self.try_send(EngineRequest::Seek(self.seek_step)).await;
            }
            Command::SeekBackward => {
                self.try_send(EngineRequest::Seek(-self.seek_step)).await;
            }
            Command::Exit => unreachable!("handled above"),
        }

        Ok(Step::Continue)
    }

    async fn try_send(&mut self, request: EngineRequest) -> bool {
        match self.engine.send(request).await {
            Ok(()) => true,
            Err(Error::NoActiveSession) => {
                tracing::warn!(?request, "Command with no active session, ignoring");
                false
            }
            Err(err) => {
                tracing::warn!(?request, "Engine command failed: {err}");
                false
            }
        }
    }

    async fn handle_engine(&mut self, event: EngineEvent) -> Result<Step> {
        match event {
            EngineEvent::EndOfFile => {
                tracing::info!("Playback finished");
                self.show_splash().await?;
            }
            EngineEvent::Exited(code) => {
                tracing::warn!(?code, "Engine exited unexpectedly");
                // Drop the dead session's bookkeeping before relaunching
                self.engine.terminate().await?;
                self.show_splash().await?;
            }
            EngineEvent::PauseChanged(paused) => match (self.state, paused) {
                (PlaybackState::Playing, true) => self.state = PlaybackState::Paused,
                (PlaybackState::Paused, false) => self.state = PlaybackState::Playing,
                _ => {}
            },
        }
        Ok(Step::Continue)
    }
}
