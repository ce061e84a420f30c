//! Display and engine settings supplied per session.
//!
//! Nothing here is persisted; the CLI builds these from its arguments.

use crate::store::DEFAULT_CHANNELS;

pub const DEFAULT_SAMPLE_RATE: u32 = 200_000;
pub const DEFAULT_CHANNEL_NAMES: [&str; DEFAULT_CHANNELS] = ["SSC", "FL1", "FL2", "SSC"];

/// Channel names and the sample rate used for the time axis.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    pub names: Vec<String>,
    pub sample_rate: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            names: DEFAULT_CHANNEL_NAMES.iter().map(|n| n.to_string()).collect(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl ChannelConfig {
    /// Display name for a channel, falling back to "Channel N" (1-based).
    pub fn name(&self, channel: usize) -> String {
        self.names
            .get(channel)
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Channel {}", channel + 1))
    }

    pub fn time_of(&self, sample: usize) -> f64 {
        sample as f64 / self.rate()
    }

    /// Sample index at `secs`, rounded down. Negative times map to 0.
    pub fn sample_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.rate()).floor() as u64
    }

    pub fn duration(&self, samples: usize) -> f64 {
        self.time_of(samples)
    }

    fn rate(&self) -> f64 {
        self.sample_rate.max(1) as f64
    }
}

/// Tuning knobs for the resolution cache and long scans.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Extra viewport widths bucketed on each side when a reduction is built.
    pub prefetch_margin: f64,
    /// Upper bound on cached buckets per channel, as a multiple of the point budget.
    pub cache_budget_factor: usize,
    /// Samples scanned between cancellation checks.
    pub chunk_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            prefetch_margin: 1.0,
            cache_budget_factor: 64,
            chunk_samples: 1 << 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_conversion() {
        let config = ChannelConfig::default();
        assert_eq!(config.time_of(200_000), 1.0);
        assert_eq!(config.sample_at(0.5), 100_000);
        assert_eq!(config.sample_at(-1.0), 0);
        assert_eq!(config.duration(50_000), 0.25);
    }

    #[test]
    fn test_name_fallback() {
        let config = ChannelConfig {
            names: vec!["A".into(), String::new()],
            sample_rate: 1000,
        };
        assert_eq!(config.name(0), "A");
        assert_eq!(config.name(1), "Channel 2");
        assert_eq!(config.name(5), "Channel 6");
    }
}
