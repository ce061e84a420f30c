use super::{active_channels, format_time, open_recording};
use crate::cancel::Supersession;
use crate::config::{ChannelConfig, EngineConfig};
use crate::downsample::{Extrema, scan_extrema};
use crate::error::{Error, Result};
use crate::store::{RecordLayout, SignalSource};
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL_CONDENSED};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

pub fn run(
    file: &Path,
    layout: RecordLayout,
    config: &ChannelConfig,
    engine: &EngineConfig,
    active: &[usize],
) -> Result<()> {
    let signal = open_recording(file, layout)?;
    let channels = active_channels(active, &signal);

    let supersession = Supersession::new();
    let token = supersession.issue();
    let interrupt = supersession.clone();
    ctrlc::set_handler(move || interrupt.cancel_all())
        .map_err(|e| std::io::Error::other(format!("Failed to set Ctrl-C handler: {e}")))?;

    let total = signal.sample_count();
    let started = Instant::now();
    let mut rows: Vec<(usize, Result<Option<Extrema>>)> = Vec::with_capacity(channels.len());

    for &channel in &channels {
        let outcome = signal.channel(channel, 0, total).and_then(|view| {
            let mut last_pct = u64::MAX;
            scan_extrema(&view, engine.chunk_samples, &token, |done| {
                let pct = (done as u64 * 100) / total.max(1) as u64;
                if pct != last_pct {
                    last_pct = pct;
                    eprint!("\rScanning ch{} {}: {:>3}%", channel, config.name(channel), pct);
                    let _ = std::io::stderr().flush();
                }
            })
        });
        eprintln!();

        if matches!(outcome, Err(Error::Cancelled)) {
            eprintln!("Interrupted.");
            return Err(Error::Cancelled);
        }
        rows.push((channel, outcome));
    }

    eprintln!(
        "Scanned {} samples x {} channels in {:.2?}",
        total,
        channels.len(),
        started.elapsed()
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["CH", "NAME", "MIN", "AT", "MAX", "AT", "MEAN"]);

    let mut failed = Vec::new();
    for (channel, outcome) in rows {
        match outcome {
            Ok(Some(ext)) => {
                let b = ext.bucket;
                table.add_row(vec![
                    Cell::new(channel),
                    Cell::new(config.name(channel)),
                    Cell::new(b.min.value).set_alignment(CellAlignment::Right),
                    Cell::new(format_time(config.time_of(b.min.index))),
                    Cell::new(b.max.value).set_alignment(CellAlignment::Right),
                    Cell::new(format_time(config.time_of(b.max.index))),
                    Cell::new(format!("{:.3}", ext.mean())).set_alignment(CellAlignment::Right),
                ]);
            }
            Ok(None) => {
                table.add_row(vec![Cell::new(channel), Cell::new(config.name(channel))]);
            }
            Err(e) => {
                table.add_row(vec![
                    Cell::new(channel),
                    Cell::new(config.name(channel)),
                    Cell::new(format!("error: {e}")),
                ]);
                failed.push(channel);
            }
        }
    }
    println!("{table}");

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialFailure { failed })
    }
}
