//! scanplay daemon entrypoint

use clap::Parser;
use scanplay::{Controller, MpvEngine, PlayerEvent, Result, ScanplayConfig, logging, scanner};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::info;

const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(
    name = "scanplayd",
    version,
    about = "QR-token media player daemon for dedicated displays"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to scanplay.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the scanner device name substring (takes precedence over config file)
    #[arg(long, value_name = "NAME")]
    device: Option<String>,

    /// Override the media directory
    #[arg(long, value_name = "DIR")]
    media_dir: Option<PathBuf>,

    /// Override the splash asset path
    #[arg(long, value_name = "PATH")]
    splash: Option<PathBuf>,

    /// Override the engine IPC socket path
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Read line tokens from stdin instead of the scanner (diagnostic mode)
    #[arg(long)]
    stdin: bool,

    /// List key-capable input devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        list_devices();
        return Ok(());
    }

    let mut config = ScanplayConfig::load(cli.config.as_deref())?;

    if let Some(ref name) = cli.device {
        config.scanner.device_name = name.clone();
    }
    if let Some(ref dir) = cli.media_dir {
        config.media.dir = dir.clone();
    }
    if let Some(ref splash) = cli.splash {
        config.media.splash = splash.clone();
    }
    if let Some(ref socket) = cli.socket {
        config.engine.socket = socket.clone();
    }

    logging::init(&config.logging)?;

    std::fs::create_dir_all(&config.media.dir)?;
    if !config.media.splash.exists() {
        tracing::warn!(
            splash = %config.media.splash.display(),
            "Splash asset missing, the idle screen will fail to launch"
        );
    }

    let (tx, rx) = mpsc::channel::<PlayerEvent>(EVENT_QUEUE_CAPACITY);

    let engine = MpvEngine::new(config.engine.clone(), tx.clone());
    let controller = Controller::new(&config, Box::new(engine));

    if cli.stdin {
        info!("Diagnostic mode: reading tokens from stdin");
        tokio::spawn(read_stdin(tx.clone()));
    } else {
        tokio::spawn(scanner::run_scanner(config.scanner.clone(), tx.clone()));
        if config.scanner.keyboard_exit {
            tokio::spawn(scanner::watch_keyboards(
                config.scanner.device_name.clone(),
                tx.clone(),
            ));
        }
    }

    tokio::spawn(watch_signals(tx.clone()));
    drop(tx);

    info!(media_dir = %config.media.dir.display(), "Starting scanplay");
    controller.run(rx).await?;

    info!("Goodbye!");
    Ok(())
}

fn list_devices() {
    let devices = scanner::list_devices();
    if devices.is_empty() {
        println!("No key-capable input devices found (check /dev/input permissions)");
        return;
    }
    println!("Discovered input devices:");
    for dev in devices {
        println!("  {} ({})", dev.name, dev.path.display());
    }
}

/// Feed trimmed stdin lines through the same classification path as scans.
async fn read_stdin(events: mpsc::Sender<PlayerEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let token = line.trim().to_string();
                if token.is_empty() {
                    continue;
                }
                if events.send(PlayerEvent::Scan(token)).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::warn!("stdin read error: {err}");
                return;
            }
        }
    }
}

/// Translate SIGINT/SIGTERM into a Shutdown event on the controller queue.
async fn watch_signals(events: mpsc::Sender<PlayerEvent>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            tracing::warn!("Failed to install SIGTERM handler: {err}");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }

    let _ = events.send(PlayerEvent::Shutdown).await;
}
