//! Scan token classification and duplicate-scan debouncing
//!
//! A completed scan is either a `CMD:`-prefixed playback command or a media
//! reference looked up against the media directory. The classifier also owns
//! the debounce slot that suppresses double-triggered scans.

use std::time::{Duration, Instant};

/// Prefix marking a scanned token as a playback command (case-sensitive)
pub const COMMAND_PREFIX: &str = "CMD:";

/// Playback commands encodable as QR tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle pause/unpause
    Pause,
    /// Stop playback and return to the splash screen
    Stop,
    /// Raise volume by the configured step
    VolumeUp,
    /// Lower volume by the configured step
    VolumeDown,
    /// Toggle mute
    Mute,
    /// Seek forward by the configured step
    SeekForward,
    /// Seek backward by the configured step
    SeekBackward,
    /// Shut the player down
    Exit,
}

impl Command {
    /// Parse a command name as it appears after `CMD:` (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "PAUSE" => Some(Self::Pause),
            "STOP" => Some(Self::Stop),
            "VOLUP" => Some(Self::VolumeUp),
            "VOLDOWN" => Some(Self::VolumeDown),
            "MUTE" => Some(Self::Mute),
            "FWD" => Some(Self::SeekForward),
            "RWD" => Some(Self::SeekBackward),
            "EXIT" => Some(Self::Exit),
            _ => None,
        }
    }

    /// Canonical wire name used in QR tokens
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "PAUSE",
            Self::Stop => "STOP",
            Self::VolumeUp => "VOLUP",
            Self::VolumeDown => "VOLDOWN",
            Self::Mute => "MUTE",
            Self::SeekForward => "FWD",
            Self::SeekBackward => "RWD",
            Self::Exit => "EXIT",
        }
    }
}

/// Outcome of classifying a completed scan token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// A recognized `CMD:` playback command
    Command(Command),
    /// A normalized (trimmed, lower-cased) media reference
    Media(String),
}

/// Classifies scan tokens and suppresses duplicate scans.
///
/// The debounce slot holds the last *forwarded* token and its acceptance
/// instant. Rejected or unrecognized tokens never occupy the slot, so they
/// cannot shadow a following valid scan.
pub struct Classifier {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Classifier {
    /// Create a classifier with the given debounce window.
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Classify a raw token using the current time.
    pub fn classify(&mut self, raw: &str) -> Option<Classified> {
        self.classify_at(raw, Instant::now())
    }

    /// Classify a raw token at an explicit instant.
    ///
    /// Returns `None` when the token is empty, debounced, rejected, or an
    /// unrecognized command; such tokens never reach the controller.
    pub fn classify_at(&mut self, raw: &str, now: Instant) -> Option<Classified> {
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }

        if let Some((last, accepted_at)) = &self.last {
            if last == token && now.duration_since(*accepted_at) < self.window {
                tracing::debug!(%token, "Debounced duplicate scan");
                return None;
            }
        }

        // Reject path traversal attempts before any lookup happens
        if token.contains('/') || token.contains("..") {
            tracing::warn!(%token, "Rejected suspicious scan input");
            return None;
        }

        let classified = if let Some(name) = token.strip_prefix(COMMAND_PREFIX) {
            match Command::parse(name) {
                Some(command) => Classified::Command(command),
                None => {
                    tracing::warn!("{}", crate::Error::InvalidCommand(name.to_string()));
                    return None;
                }
            }
        } else {
            Classified::Media(token.to_lowercase())
        };

        self.last = Some((token.to_string(), now));
        Some(classified)
    }
}
