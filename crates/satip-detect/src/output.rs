//! JSON rendering of discovered devices

use anyhow::{Context, Result};
use satip_core::DeviceRecord;
use std::io::Write;
use std::path::Path;

/// Pretty-printed JSON array with sorted keys and a trailing newline
pub fn render(devices: &[DeviceRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(devices).context("Failed to serialize devices")?;
    json.push('\n');
    Ok(json)
}

/// Write the device list to `path`, or to stdout when no path is given
pub fn write_devices(devices: &[DeviceRecord], path: Option<&Path>) -> Result<()> {
    let json = render(devices)?;
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
