use crate::config::{ChannelConfig, DEFAULT_CHANNEL_NAMES, EngineConfig};
use crate::store::RecordLayout;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bsrview")]
#[command(about = "Explore large multi-channel BSR signal recordings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Channels per record
    #[arg(long, global = true, default_value = "4")]
    pub channels: usize,

    /// Sample rate in Hz (used for the time axis only)
    #[arg(long, short = 'r', global = true, default_value = "200000")]
    pub sample_rate: u32,

    /// Channel display names, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    pub names: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show size, sample count and duration of a recording
    Info {
        /// BSR file
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a range the way a plot would see it (raw or min/max reduced)
    Render {
        /// BSR file
        file: PathBuf,

        /// Range start as time (e.g. 1s, 250ms, 0.5)
        #[arg(long, value_parser = parse_duration, conflicts_with = "start")]
        from: Option<Duration>,

        /// Range end as time
        #[arg(long, value_parser = parse_duration, conflicts_with = "end")]
        to: Option<Duration>,

        /// Range start as sample index
        #[arg(long)]
        start: Option<u64>,

        /// Range end as sample index (exclusive)
        #[arg(long)]
        end: Option<u64>,

        /// Channels to render (0-based), comma separated; defaults to all
        #[arg(long = "channel", short = 'c', value_delimiter = ',')]
        active: Vec<usize>,

        /// Point budget (roughly the plot width in pixels)
        #[arg(long, short = 'b', default_value = "1000")]
        budget: usize,

        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Full-resolution min/max/mean pass over whole channels (Ctrl-C to stop)
    Scan {
        /// BSR file
        file: PathBuf,

        /// Channels to scan (0-based), comma separated; defaults to all
        #[arg(long = "channel", short = 'c', value_delimiter = ',')]
        active: Vec<usize>,
    },

    /// Interactive terminal viewer
    View {
        /// BSR file
        file: PathBuf,

        /// Extra viewport widths to pre-reduce on each side for panning
        #[arg(long, default_value = "1.0")]
        margin: f64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    // Try humantime first
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Bare number as (fractional) seconds
    if let Ok(secs) = s.parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        return Ok(Duration::from_secs_f64(secs));
    }

    Err(format!(
        "Invalid time '{}'. Examples: 1s, 250ms, 1m30s, 0.5",
        s
    ))
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.channels == 0 || self.channels > 256 {
            return Err(format!(
                "Channel count must be between 1 and 256, got {}",
                self.channels
            ));
        }

        if self.sample_rate == 0 {
            return Err("Sample rate must be positive".to_string());
        }

        if self.names.len() > self.channels {
            return Err(format!(
                "{} names given for {} channels",
                self.names.len(),
                self.channels
            ));
        }

        match &self.command {
            Command::Render { budget, .. } if *budget == 0 => {
                Err("Point budget must be at least 1".to_string())
            }
            Command::View { margin, .. } if !(0.0..=16.0).contains(margin) => {
                Err(format!("Margin must be between 0 and 16, got {}", margin))
            }
            _ => Ok(()),
        }
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.channels)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let names = (0..self.channels)
            .map(|i| {
                self.names
                    .get(i)
                    .cloned()
                    .or_else(|| DEFAULT_CHANNEL_NAMES.get(i).map(|n| n.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        ChannelConfig {
            names,
            sample_rate: self.sample_rate,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Command::View { margin, .. } = &self.command {
            config.prefetch_margin = *margin;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_render_args() {
        let cli = Cli::try_parse_from([
            "bsrview", "render", "rec.bsr", "--from", "1s", "--to", "2s", "-c", "0,3", "-b",
            "640", "--names", "A,B",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
        let config = cli.channel_config();
        assert_eq!(config.names, vec!["A", "B", "FL2", "SSC"]);
        match cli.command {
            Command::Render {
                from, active, budget, ..
            } => {
                assert_eq!(from, Some(Duration::from_secs(1)));
                assert_eq!(active, vec![0, 3]);
                assert_eq!(budget, 640);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_bad_layout() {
        let cli = Cli::try_parse_from(["bsrview", "info", "x.bsr", "--channels", "0"]).unwrap();
        assert!(cli.validate().is_err());
        let cli =
            Cli::try_parse_from(["bsrview", "info", "x.bsr", "--channels", "2", "--names", "a,b,c"])
                .unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_view_margin_reaches_engine_config() {
        let cli = Cli::try_parse_from(["bsrview", "view", "x.bsr", "--margin", "2.5"]).unwrap();
        assert!(cli.validate().is_ok());
        let engine = cli.engine_config();
        assert_eq!(engine.prefetch_margin, 2.5);
        assert_eq!(engine.cache_budget_factor, EngineConfig::default().cache_budget_factor);
    }

    #[test]
    fn test_from_conflicts_with_start() {
        assert!(
            Cli::try_parse_from(["bsrview", "render", "x.bsr", "--from", "1s", "--start", "5"])
                .is_err()
        );
    }
}
