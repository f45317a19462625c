//! scanplay runtime configuration handling

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanplayConfig {
    /// Barcode scanner input device configuration
    pub scanner: ScannerOptions,
    /// Media directory and splash asset configuration
    pub media: MediaOptions,
    /// Playback engine (mpv) configuration
    pub engine: EngineOptions,
    /// Debounce and command-step tuning
    pub playback: PlaybackOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl ScanplayConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No scanplay.toml / scanplay.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["scanplay.toml", "scanplay.yaml", "scanplay.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("scanplay");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.scanner.apply_env_overrides();
        self.media.apply_env_overrides();
        self.engine.apply_env_overrides();
        self.playback.apply_env_overrides();
        self.logging.apply_env_overrides();
    }
}

/// Barcode scanner input device options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerOptions {
    /// Substring matched (case-insensitively) against input device names
    pub device_name: String,
    /// Seconds to wait before retrying device discovery after loss or absence
    pub reconnect_secs: u64,
    /// Watch non-scanner keyboards for Q/ESC and exit on press
    pub keyboard_exit: bool,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            device_name: "SCANNER".to_string(),
            reconnect_secs: 3,
            keyboard_exit: true,
        }
    }
}

impl ScannerOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("SCANPLAY_SCANNER_DEVICE") {
            self.device_name = name;
        }
        if let Ok(secs) = env::var("SCANPLAY_SCANNER_RECONNECT") {
            if let Ok(parsed) = secs.parse::<u64>() {
                self.reconnect_secs = parsed.max(1);
            }
        }
    }
}

/// Media directory and splash asset options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaOptions {
    /// Directory scanned for playable files
    pub dir: PathBuf,
    /// Static asset shown whenever nothing is playing
    pub splash: PathBuf,
    /// Allowed file extensions (lowercase, without dot)
    pub extensions: Vec<String>,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("media"),
            splash: PathBuf::from("assets/splash.png"),
            extensions: ["mp4", "mkv", "avi", "webm", "mov", "m4v", "ts", "flv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MediaOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("SCANPLAY_MEDIA_DIR") {
            self.dir = PathBuf::from(dir);
        }
        if let Ok(splash) = env::var("SCANPLAY_SPLASH") {
            self.splash = PathBuf::from(splash);
        }
    }
}

/// Playback engine (mpv) process and control-channel options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Engine binary to spawn
    pub binary: String,
    /// Unix domain socket path for the JSON IPC control channel
    pub socket: PathBuf,
    /// Seconds to wait for the control socket after process launch
    pub startup_timeout_secs: u64,
    /// Seconds to wait for graceful exit before force-killing
    pub grace_secs: u64,
    /// Render fullscreen (disable only for windowed debugging)
    pub fullscreen: bool,
    /// Additional arguments appended to the engine command line
    pub extra_args: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            binary: "mpv".to_string(),
            socket: PathBuf::from("/tmp/scanplay-mpv.sock"),
            startup_timeout_secs: 5,
            grace_secs: 5,
            fullscreen: true,
            extra_args: Vec::new(),
        }
    }
}

impl EngineOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(binary) = env::var("SCANPLAY_MPV_BINARY") {
            self.binary = binary;
        }
        if let Ok(socket) = env::var("SCANPLAY_MPV_SOCKET") {
            self.socket = PathBuf::from(socket);
        }
        if let Ok(secs) = env::var("SCANPLAY_MPV_STARTUP_TIMEOUT") {
            if let Ok(parsed) = secs.parse::<u64>() {
                self.startup_timeout_secs = parsed.max(1);
            }
        }
        if let Ok(secs) = env::var("SCANPLAY_MPV_GRACE") {
            if let Ok(parsed) = secs.parse::<u64>() {
                self.grace_secs = parsed.max(1);
            }
        }
    }
}

/// Debounce and command-step tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Window in milliseconds during which an identical re-scan is suppressed
    pub debounce_ms: u64,
    /// Volume change per VOLUP/VOLDOWN command, in percent
    pub volume_step: i32,
    /// Seek distance per FWD/RWD command, in seconds
    pub seek_step_secs: i64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            volume_step: 5,
            seek_step_secs: 10,
        }
    }
}

impl PlaybackOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(ms) = env::var("SCANPLAY_DEBOUNCE_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                self.debounce_ms = parsed;
            }
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `SCANPLAY_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("SCANPLAY_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("SCANPLAY_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("SCANPLAY_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("SCANPLAY_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}
