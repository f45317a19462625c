//! Scan token reconstruction and keyboard exit watching

use crate::config::ScannerOptions;
use crate::controller::PlayerEvent;
use crate::error::{Error, Result};
use crate::scanner::{find_device, keymap};
use crate::token::Command;
use evdev::{Device, InputEventKind, Key};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;

const KEYBOARD_RESCAN: Duration = Duration::from_secs(3);

/// Continuously read the scanner, reconnecting whenever it disappears.
///
/// Runs until the controller's event queue closes. Device absence is the
/// `DeviceUnavailable` condition: logged, retried on the configured interval,
/// never fatal to the rest of the player.
pub async fn run_scanner(options: ScannerOptions, events: mpsc::Sender<PlayerEvent>) {
    let reconnect = Duration::from_secs(options.reconnect_secs);

    loop {
        let (path, mut device) = match find_device(&options.device_name) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!("{err}, retrying in {}s", options.reconnect_secs);
                sleep(reconnect).await;
                continue;
            }
        };

        tracing::info!(name = device.name().unwrap_or("unknown"), path = %path.display(), "Found scanner");

        if let Err(err) = device.grab() {
            tracing::warn!("Could not grab scanner exclusively: {err}");
            sleep(reconnect).await;
            continue;
        }

        match read_device(device, &events).await {
            Ok(()) => return, // queue closed, player is shutting down
            Err(err) => {
                tracing::warn!("Scanner disconnected, will reconnect: {err}");
            }
        }

        sleep(reconnect).await;
    }
}

/// Reassemble key events into line tokens until the device errors out.
async fn read_device(device: Device, events: &mpsc::Sender<PlayerEvent>) -> Result<()> {
    let mut stream = device
        .into_event_stream()
        .map_err(|e| Error::Input(e.to_string()))?;
    let mut assembler = LineAssembler::new();

    loop {
        let event = stream
            .next_event()
            .await
            .map_err(|e| Error::Input(e.to_string()))?;
        let InputEventKind::Key(key) = event.kind() else {
            continue;
        };

        if let Some(token) = assembler.push(key, event.value()) {
            tracing::info!(%token, "Scan complete");
            if events.send(PlayerEvent::Scan(token)).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Reassembles a stream of `(key, value)` pairs into Enter-terminated tokens.
///
/// Tracks shift state across events, takes key presses only (value 1; holds
/// and releases pass through), and swallows empty lines so a stray Enter
/// never produces a token.
#[derive(Default)]
struct LineAssembler {
    buffer: String,
    shift: bool,
}

impl LineAssembler {
    fn new() -> Self {
        Self::default()
    }

    /// Feed one key event; returns the completed token on Enter.
    fn push(&mut self, key: Key, value: i32) -> Option<String> {
        if matches!(key, Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT) {
            // value 1 = press, 2 = autorepeat hold, 0 = release
            self.shift = value != 0;
            return None;
        }

        if value != 1 {
            return None;
        }

        if matches!(key, Key::KEY_ENTER | Key::KEY_KPENTER) {
            let token = self.buffer.trim().to_string();
            self.buffer.clear();
            return (!token.is_empty()).then_some(token);
        }

        if let Some(ch) = keymap::resolve(key, self.shift) {
            self.buffer.push(ch);
        }
        None
    }
}

/// Watch non-scanner keyboards for Q/ESC and queue an Exit command on press.
///
/// Devices are observed without grabbing, so normal desktop use is
/// unaffected. Rescans when no keyboard is present or one disconnects.
pub async fn watch_keyboards(scanner_name: String, events: mpsc::Sender<PlayerEvent>) {
    let needle = scanner_name.to_lowercase();

    loop {
        let keyboards: Vec<Device> = evdev::enumerate()
            .filter(|(_, device)| {
                let is_scanner = device
                    .name()
                    .is_some_and(|n| n.to_lowercase().contains(&needle));
                let has_keys = device
                    .supported_keys()
                    .is_some_and(|keys| keys.contains(Key::KEY_Q));
                has_keys && !is_scanner
            })
            .map(|(_, device)| device)
            .collect();

        if keyboards.is_empty() {
            sleep(KEYBOARD_RESCAN).await;
            continue;
        }

        tracing::info!(count = keyboards.len(), "Watching keyboard(s) for Q/ESC exit");

        let mut watchers = JoinSet::new();
        for device in keyboards {
            watchers.spawn(watch_one(device, events.clone()));
        }

        // One watcher finishing means a disconnect or a closed queue; rescan
        watchers.join_next().await;
        watchers.shutdown().await;

        if events.is_closed() {
            return;
        }
        sleep(KEYBOARD_RESCAN).await;
    }
}

async fn watch_one(device: Device, events: mpsc::Sender<PlayerEvent>) {
    let mut stream = match device.into_event_stream() {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!("Could not open keyboard stream: {err}");
            return;
        }
    };

    loop {
        match stream.next_event().await {
            Ok(event) => {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };
                if event.value() == 1 && matches!(key, Key::KEY_Q | Key::KEY_ESC) {
                    tracing::info!("Exit key pressed on keyboard");
                    if events.send(PlayerEvent::Key(Command::Exit)).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::debug!("Keyboard disconnected: {err}");
                return;
            }
        }
    }
}
