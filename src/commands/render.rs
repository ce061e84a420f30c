use super::{active_channels, format_time, open_recording};
use crate::cancel::CancelToken;
use crate::config::{ChannelConfig, EngineConfig};
use crate::diagnostics::Diagnostic;
use crate::downsample::Point;
use crate::error::{Error, Result};
use crate::pipeline::{RenderPipeline, RenderRequest, RenderResult};
use crate::range::ViewRange;
use crate::selector::Mode;
use crate::store::{RecordLayout, SignalSource};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Where the rendered range starts and ends.
#[derive(Clone, Copy, Debug, Default)]
pub struct RangeArgs {
    pub from: Option<Duration>,
    pub to: Option<Duration>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeArgs {
    fn resolve(&self, config: &ChannelConfig, samples: usize) -> (u64, u64) {
        let start = self
            .start
            .or_else(|| self.from.map(|t| config.sample_at(t.as_secs_f64())))
            .unwrap_or(0);
        let end = self
            .end
            .or_else(|| self.to.map(|t| config.sample_at(t.as_secs_f64())))
            .unwrap_or(samples as u64);
        (start, end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Serialize)]
struct JsonChannel<'a> {
    channel: usize,
    name: String,
    mode: Option<Mode>,
    bucket_width: Option<usize>,
    points: &'a [Point],
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonRender<'a> {
    file: String,
    range: ViewRange,
    start_secs: f64,
    end_secs: f64,
    point_budget: usize,
    diagnostics: &'a [Diagnostic],
    channels: Vec<JsonChannel<'a>>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: &Path,
    layout: RecordLayout,
    config: &ChannelConfig,
    engine: EngineConfig,
    range: RangeArgs,
    active: &[usize],
    budget: usize,
    format: OutputFormat,
) -> Result<()> {
    let signal = open_recording(file, layout)?;
    let channels = active_channels(active, &signal);
    let (start, end) = range.resolve(config, signal.sample_count());

    let pipeline = RenderPipeline::new(Arc::new(signal), engine);
    let request = RenderRequest::new(start, end, channels, budget);
    let result = pipeline.render(&request, &CancelToken::never())?;

    for diagnostic in &result.diagnostics {
        eprintln!("Warning: {}", diagnostic);
    }

    match format {
        OutputFormat::Table => print_table(file, config, &result),
        OutputFormat::Csv => print_csv(config, &result),
        OutputFormat::Json => print_json(file, config, &result)?,
    }

    let failed: Vec<usize> = result.failures().map(|(channel, _)| channel).collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialFailure { failed })
    }
}

fn print_table(file: &Path, config: &ChannelConfig, result: &RenderResult) {
    println!("# {}", file.display());
    println!(
        "# Range: {} .. {} (samples {}) | Budget: {} points",
        format_time(config.time_of(result.range.start())),
        format_time(config.time_of(result.range.end())),
        result.range,
        result.point_budget
    );

    for outcome in &result.channels {
        let name = config.name(outcome.channel);
        println!();
        match &outcome.result {
            Ok(render) => {
                let mode = match (render.mode, render.bucket_width) {
                    (Mode::Reduced, Some(w)) => format!("reduced, {} samples/bucket", w),
                    _ => "full resolution".to_string(),
                };
                println!(
                    "## ch{} {} [{}] {} points",
                    outcome.channel,
                    name,
                    mode,
                    render.points.len()
                );
                println!("{:>12}  {:>14}  {:>12}", "SAMPLE", "TIME", "VALUE");
                println!("{}", "-".repeat(42));
                for p in &render.points {
                    println!(
                        "{:>12}  {:>14}  {:>12}",
                        p.index,
                        format!("{:.6}", config.time_of(p.index)),
                        p.value
                    );
                }
            }
            Err(e) => println!("## ch{} {} [error] {}", outcome.channel, name, e),
        }
    }
}

fn print_csv(config: &ChannelConfig, result: &RenderResult) {
    println!("channel,name,mode,sample,time_s,value");
    for render in result.renders() {
        let name = config.name(render.channel);
        let mode = match render.mode {
            Mode::Full => "full",
            Mode::Reduced => "reduced",
        };
        for p in &render.points {
            println!(
                "{},{},{},{},{:.9},{}",
                render.channel,
                csv_escape(&name),
                mode,
                p.index,
                config.time_of(p.index),
                p.value
            );
        }
    }
}

fn print_json(file: &Path, config: &ChannelConfig, result: &RenderResult) -> Result<()> {
    let channels = result
        .channels
        .iter()
        .map(|outcome| {
            let render = outcome.result.as_ref().ok();
            JsonChannel {
                channel: outcome.channel,
                name: config.name(outcome.channel),
                mode: render.map(|r| r.mode),
                bucket_width: render.and_then(|r| r.bucket_width),
                points: render.map(|r| r.points.as_slice()).unwrap_or(&[]),
                error: outcome.result.as_ref().err().map(|e| e.to_string()),
            }
        })
        .collect();

    let out = JsonRender {
        file: file.display().to_string(),
        range: result.range,
        start_secs: config.time_of(result.range.start()),
        end_secs: config.time_of(result.range.end()),
        point_budget: result.point_budget,
        diagnostics: &result.diagnostics,
        channels,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&out).map_err(std::io::Error::other)?
    );
    Ok(())
}

fn csv_escape(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_resolution() {
        let config = ChannelConfig::default();
        let args = RangeArgs {
            from: Some(Duration::from_millis(500)),
            to: None,
            start: None,
            end: Some(150_000),
        };
        assert_eq!(args.resolve(&config, 1_000_000), (100_000, 150_000));
        assert_eq!(RangeArgs::default().resolve(&config, 42), (0, 42));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("FL1"), "FL1");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
