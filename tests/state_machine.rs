//! Controller state machine tests against a recording mock engine

use async_trait::async_trait;
use scanplay::{
    Command, Controller, EngineEvent, EngineRequest, Error, PlaybackEngine, PlaybackState,
    PlayerEvent, Result, ScanplayConfig, Step,
};
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Default)]
struct EngineLog {
    launches: Vec<PathBuf>,
    requests: Vec<EngineRequest>,
    terminations: usize,
    active: Option<u64>,
    next_id: u64,
    fail_media_launch: bool,
}

/// Records every engine call; sessions are plain counters.
struct MockEngine {
    log: Arc<Mutex<EngineLog>>,
}

fn is_splash(path: &Path) -> bool {
    path.file_name() == Some(OsStr::new("splash.png"))
}

#[async_trait]
impl PlaybackEngine for MockEngine {
    async fn launch(&mut self, path: &Path) -> Result<()> {
        let mut log = self.log.lock().expect("log lock");
        if log.active.take().is_some() {
            log.terminations += 1;
        }
        if log.fail_media_launch && !is_splash(path) {
            return Err(Error::EngineLaunch("mock launch failure".to_string()));
        }
        log.next_id += 1;
        log.active = Some(log.next_id);
        log.launches.push(path.to_path_buf());
        Ok(())
    }

    async fn send(&mut self, request: EngineRequest) -> Result<()> {
        let mut log = self.log.lock().expect("log lock");
        if log.active.is_none() {
            return Err(Error::NoActiveSession);
        }
        log.requests.push(request);
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        let mut log = self.log.lock().expect("log lock");
        if log.active.take().is_some() {
            log.terminations += 1;
        }
        Ok(())
    }

    fn is_current(&self, session: u64) -> bool {
        self.log.lock().expect("log lock").active == Some(session)
    }
}

struct Harness {
    controller: Controller,
    log: Arc<Mutex<EngineLog>>,
    splash: PathBuf,
    _dir: TempDir,
}

impl Harness {
    async fn new(debounce_ms: u64, files: &[&str]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        for name in files {
            File::create(dir.path().join(name)).expect("create media file");
        }
        let splash = dir.path().join("splash.png");
        File::create(&splash).expect("create splash");

        let mut config = ScanplayConfig::default();
        config.media.dir = dir.path().to_path_buf();
        config.media.splash = splash.clone();
        config.playback.debounce_ms = debounce_ms;

        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = MockEngine {
            log: Arc::clone(&log),
        };
        let mut controller = Controller::new(&config, Box::new(engine));
        controller.show_splash().await.expect("initial splash");

        Self {
            controller,
            log,
            splash,
            _dir: dir,
        }
    }

    async fn scan(&mut self, token: &str) -> Step {
        self.controller
            .handle(PlayerEvent::Scan(token.to_string()))
            .await
            .expect("handle scan")
    }

    async fn engine_event(&mut self, session: u64, event: EngineEvent) -> Step {
        self.controller
            .handle(PlayerEvent::Engine { session, event })
            .await
            .expect("handle engine event")
    }

    fn active_session(&self) -> u64 {
        self.log
            .lock()
            .expect("log lock")
            .active
            .expect("active session")
    }

    fn launches(&self) -> Vec<PathBuf> {
        self.log.lock().expect("log lock").launches.clone()
    }

    fn requests(&self) -> Vec<EngineRequest> {
        self.log.lock().expect("log lock").requests.clone()
    }
}

#[tokio::test]
async fn scan_resolves_and_plays() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;

    // Case-insensitive: scanned token differs in case from the filename
    h.scan("Bluey-S1E1").await;

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    let launches = h.launches();
    assert_eq!(launches.len(), 2, "splash then media");
    assert!(launches[1].ends_with("bluey-s1e1.mp4"));
}

#[tokio::test]
async fn unknown_reference_never_launches() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;

    h.scan("not-a-real-show").await;

    assert_eq!(h.controller.state(), PlaybackState::Idle);
    assert_eq!(h.launches().len(), 1, "only the initial splash");
}

#[tokio::test]
async fn pause_command_is_an_idempotent_pair() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;

    h.scan("CMD:PAUSE").await;
    assert_eq!(h.controller.state(), PlaybackState::Paused);

    h.scan("CMD:PAUSE").await;
    assert_eq!(h.controller.state(), PlaybackState::Playing);

    assert_eq!(
        h.requests(),
        vec![EngineRequest::PauseToggle, EngineRequest::PauseToggle]
    );
}

#[tokio::test]
async fn idle_ignores_everything_but_exit() {
    let mut h = Harness::new(0, &[]).await;

    for token in ["CMD:PAUSE", "CMD:STOP", "CMD:VOLUP", "CMD:MUTE", "CMD:FWD"] {
        assert_eq!(h.scan(token).await, Step::Continue);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
    }
    assert!(h.requests().is_empty(), "no engine calls while idle");
    assert_eq!(h.launches().len(), 1, "splash stays up untouched");
}

#[tokio::test]
async fn stop_returns_to_splash() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;

    h.scan("CMD:STOP").await;

    assert_eq!(h.controller.state(), PlaybackState::Idle);
    let launches = h.launches();
    assert!(launches.last().map(|p| p == &h.splash).unwrap_or(false));
}

#[tokio::test]
async fn volume_and_seek_commands_pass_through() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;

    h.scan("CMD:VOLUP").await;
    h.scan("CMD:VOLDOWN").await;
    h.scan("CMD:MUTE").await;
    h.scan("CMD:FWD").await;
    h.scan("CMD:RWD").await;

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(
        h.requests(),
        vec![
            EngineRequest::VolumeAdd(5),
            EngineRequest::VolumeAdd(-5),
            EngineRequest::MuteToggle,
            EngineRequest::Seek(10),
            EngineRequest::Seek(-10),
        ]
    );
}

#[tokio::test]
async fn end_of_file_converges_to_idle_from_playing_and_paused() {
    for pause_first in [false, true] {
        let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
        h.scan("bluey-s1e1").await;
        if pause_first {
            h.scan("CMD:PAUSE").await;
            assert_eq!(h.controller.state(), PlaybackState::Paused);
        }

        let session = h.active_session();
        h.engine_event(session, EngineEvent::EndOfFile).await;

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.launches().last().map(|p| p == &h.splash).unwrap_or(false));
    }
}

#[tokio::test]
async fn crash_returns_to_splash() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;

    let session = h.active_session();
    h.engine_event(session, EngineEvent::Exited(Some(1))).await;

    assert_eq!(h.controller.state(), PlaybackState::Idle);
    assert!(h.launches().last().map(|p| p == &h.splash).unwrap_or(false));
}

#[tokio::test]
async fn stale_session_events_are_dropped() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4", "bluey-s1e2.mkv"]).await;
    h.scan("bluey-s1e1").await;
    let old_session = h.active_session();

    h.scan("bluey-s1e2").await;
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    let launches_before = h.launches().len();

    // The replaced session's exit must not bounce us back to the splash
    h.engine_event(old_session, EngineEvent::Exited(None)).await;

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(h.launches().len(), launches_before);
}

#[tokio::test]
async fn rescan_of_playing_reference_restarts() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;
    let first_session = h.active_session();

    h.scan("bluey-s1e1").await;

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_ne!(h.active_session(), first_session, "fresh session");
    assert_eq!(h.launches().len(), 3, "splash + two media launches");
}

#[tokio::test]
async fn debounce_suppresses_rapid_duplicate_scans() {
    let mut h = Harness::new(2000, &["bluey-s1e1.mp4"]).await;

    h.scan("bluey-s1e1").await;
    h.scan("bluey-s1e1").await;

    assert_eq!(h.launches().len(), 2, "splash + exactly one media launch");
}

#[tokio::test]
async fn exit_command_stops_the_loop() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;

    assert_eq!(h.scan("CMD:EXIT").await, Step::Exit);
    assert!(h.log.lock().expect("log lock").active.is_none());
}

#[tokio::test]
async fn shutdown_event_stops_the_loop() {
    let mut h = Harness::new(0, &[]).await;

    let step = h
        .controller
        .handle(PlayerEvent::Shutdown)
        .await
        .expect("handle shutdown");

    assert_eq!(step, Step::Exit);
    assert!(h.log.lock().expect("log lock").active.is_none());
}

#[tokio::test]
async fn keyboard_exit_bypasses_the_token_pipeline() {
    let mut h = Harness::new(2000, &[]).await;

    let step = h
        .controller
        .handle(PlayerEvent::Key(Command::Exit))
        .await
        .expect("handle key");

    assert_eq!(step, Step::Exit);
}

#[tokio::test]
async fn failed_media_launch_falls_back_to_splash() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.log.lock().expect("log lock").fail_media_launch = true;

    h.scan("bluey-s1e1").await;

    assert_eq!(h.controller.state(), PlaybackState::Idle);
    assert!(h.launches().last().map(|p| p == &h.splash).unwrap_or(false));
}

#[tokio::test]
async fn engine_reported_pause_reconciles_state() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;
    h.scan("bluey-s1e1").await;
    let session = h.active_session();

    h.engine_event(session, EngineEvent::PauseChanged(true)).await;
    assert_eq!(h.controller.state(), PlaybackState::Paused);

    h.engine_event(session, EngineEvent::PauseChanged(false)).await;
    assert_eq!(h.controller.state(), PlaybackState::Playing);
}

/// The full walk-through from the design notes: play, pause, unpause,
/// end-of-file back to splash, then a miss that changes nothing.
#[tokio::test]
async fn full_scenario() {
    let mut h = Harness::new(0, &["bluey-s1e1.mp4"]).await;

    h.scan("bluey-s1e1").await;
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(h.launches()[1].ends_with("bluey-s1e1.mp4"));

    h.scan("CMD:PAUSE").await;
    assert_eq!(h.controller.state(), PlaybackState::Paused);

    h.scan("CMD:PAUSE").await;
    assert_eq!(h.controller.state(), PlaybackState::Playing);

    let session = h.active_session();
    h.engine_event(session, EngineEvent::EndOfFile).await;
    assert_eq!(h.controller.state(), PlaybackState::Idle);
    assert!(h.launches().last().map(|p| p == &h.splash).unwrap_or(false));

    let launches_before = h.launches().len();
    h.scan("not-a-real-show").await;
    assert_eq!(h.controller.state(), PlaybackState::Idle);
    assert_eq!(h.launches().len(), launches_before);
}
