use super::{format_bytes, format_time, open_recording};
use crate::config::ChannelConfig;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::store::{RecordLayout, SignalSource};
use comfy_table::{Table, presets::UTF8_BORDERS_ONLY};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct FileInfo<'a> {
    file: String,
    size_bytes: u64,
    samples: usize,
    channels: usize,
    channel_names: Vec<String>,
    sample_rate_hz: u32,
    duration_secs: f64,
    modified: Option<String>,
    truncation: Option<&'a Diagnostic>,
}

pub fn run(file: &Path, layout: RecordLayout, config: &ChannelConfig, json: bool) -> Result<()> {
    let signal = open_recording(file, layout)?;
    let meta = std::fs::metadata(file)?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| chrono::DateTime::<chrono::Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string());

    let info = FileInfo {
        file: file.display().to_string(),
        size_bytes: meta.len(),
        samples: signal.sample_count(),
        channels: signal.channel_count(),
        channel_names: (0..signal.channel_count()).map(|c| config.name(c)).collect(),
        sample_rate_hz: config.sample_rate,
        duration_secs: config.duration(signal.sample_count()),
        modified,
        truncation: signal.truncation(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| info.file.clone());
    table.add_row(vec!["File".to_string(), name]);
    table.add_row(vec![
        "Size".to_string(),
        format!("{} ({} bytes)", format_bytes(info.size_bytes), info.size_bytes),
    ]);
    table.add_row(vec!["Samples".to_string(), info.samples.to_string()]);
    table.add_row(vec![
        "Channels".to_string(),
        format!("{} ({})", info.channels, info.channel_names.join(", ")),
    ]);
    table.add_row(vec![
        "Sample rate".to_string(),
        format!("{:.0} kHz", info.sample_rate_hz as f64 / 1000.0),
    ]);
    table.add_row(vec!["Duration".to_string(), format_time(info.duration_secs)]);
    if let Some(modified) = &info.modified {
        table.add_row(vec!["Modified".to_string(), modified.clone()]);
    }
    if let Some(warning) = info.truncation {
        table.add_row(vec!["Warning".to_string(), warning.to_string()]);
    }
    println!("{table}");

    Ok(())
}
