pub mod info;
pub mod render;
pub mod scan;
pub mod view;

use crate::error::Result;
use crate::store::{RecordLayout, SignalFile, SignalSource};
use std::path::Path;

/// Open `file` and report any truncation on stderr.
fn open_recording(file: &Path, layout: RecordLayout) -> Result<SignalFile> {
    let signal = SignalFile::open_with(file, layout)?;
    if let Some(warning) = signal.truncation() {
        eprintln!("Warning: {}", warning);
    }
    Ok(signal)
}

/// Requested channels, or every channel when none were named.
fn active_channels(requested: &[usize], source: &dyn SignalSource) -> Vec<usize> {
    if requested.is_empty() {
        (0..source.channel_count()).collect()
    } else {
        requested.to_vec()
    }
}

/// Format seconds with a unit suited to the magnitude.
pub fn format_time(secs: f64) -> String {
    if secs >= 3600.0 {
        let h = (secs / 3600.0) as i64;
        let m = ((secs % 3600.0) / 60.0) as i64;
        format!("{}h{:02}m", h, m)
    } else if secs >= 60.0 {
        let m = (secs / 60.0) as i64;
        let s = secs % 60.0;
        format!("{}m{:04.1}s", m, s)
    } else if secs >= 1.0 {
        format!("{:.3}s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3}ms", secs * 1e3)
    } else {
        format!("{:.1}us", secs * 1e6)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
