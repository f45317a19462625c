//! Barcode scanner input via evdev
//!
//! The scanner is a HID keyboard: it types the decoded QR payload and presses
//! Enter. This module finds the device by name, grabs it exclusively, and
//! reassembles key events into line tokens. A second, non-grabbing watcher
//! surfaces Q/ESC on ordinary keyboards as an Exit command so an operator can
//! back out without scanning anything.

mod keymap;
mod reader;

pub use reader::{run_scanner, watch_keyboards};

use evdev::Device;
use serde::Serialize;
use std::path::PathBuf;

/// Information about an input device
#[derive(Debug, Clone, Serialize)]
pub struct InputDeviceInfo {
    /// Device node (e.g. "/dev/input/event3")
    pub path: PathBuf,
    /// Device name as reported by the kernel
    pub name: String,
}

/// List input devices that expose key events
pub fn list_devices() -> Vec<InputDeviceInfo> {
    evdev::enumerate()
        .filter(|(_, device)| device.supported_keys().is_some())
        .map(|(path, device)| InputDeviceInfo {
            path,
            name: device.name().unwrap_or("unknown").to_string(),
        })
        .collect()
}

/// Find the scanner device by name (case-insensitive substring match)
pub fn find_device(name: &str) -> crate::Result<(PathBuf, Device)> {
    let needle = name.to_lowercase();
    evdev::enumerate()
        .find(|(_, device)| {
            device
                .name()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .ok_or_else(|| crate::Error::DeviceUnavailable(format!("no device matching '{name}'")))
}
