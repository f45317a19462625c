//! scanplay - QR-token media player for dedicated displays
//!
//! Physical QR tokens, read by a HID-emulating barcode scanner, drive video
//! playback on a single display with no on-screen navigation. The scanner
//! types each decoded token as keystrokes; scanplay reconstructs those into
//! tokens, classifies them as media references or `CMD:` commands, and drives
//! an external mpv process over its JSON IPC socket.
//!
//! # Architecture
//!
//! - **Scanner**: exclusive evdev grab of the scanner device, line token
//!   reconstruction, reconnect on device loss
//! - **Classifier**: command parsing and duplicate-scan debouncing
//! - **Media library**: case-insensitive filename-stem lookup, re-listed per
//!   lookup so new files play without restart
//! - **Engine client**: one mpv process per launched path, persistent JSON
//!   IPC channel, asynchronous end-of-file / pause / exit notifications
//! - **Controller**: single-task state machine consuming one serialized
//!   event queue; every failure path converges back to the splash screen
//!
//! # Example
//!
//! ```no_run
//! use scanplay::{Controller, MpvEngine, PlayerEvent, ScanplayConfig};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> scanplay::Result<()> {
//!     let config = ScanplayConfig::load(None)?;
//!     let (tx, rx) = mpsc::channel::<PlayerEvent>(64);
//!
//!     let engine = MpvEngine::new(config.engine.clone(), tx.clone());
//!     let controller = Controller::new(&config, Box::new(engine));
//!
//!     tokio::spawn(scanplay::scanner::run_scanner(config.scanner.clone(), tx));
//!     controller.run(rx).await
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod scanner;
pub mod token;

// Re-exports for convenience
pub use error::{Error, Result};

pub use config::{
    EngineOptions, LogRotation, LoggingOptions, MediaOptions, PlaybackOptions, ScannerOptions,
    ScanplayConfig,
};
pub use controller::{Controller, PlaybackState, PlayerEvent, Step};
pub use engine::{EngineEvent, EngineRequest, IpcClient, IpcEvent, MpvEngine, PlaybackEngine};
pub use media::MediaLibrary;
pub use token::{COMMAND_PREFIX, Classified, Classifier, Command};
