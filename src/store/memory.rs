use super::{ChannelView, RecordLayout, SignalSource};
use crate::error::{Error, Result};

/// A recording held in memory, laid out exactly like a mapped file.
///
/// Used for synthetic signals and as a stand-in for files in tests.
#[derive(Clone, Debug)]
pub struct MemorySignal {
    layout: RecordLayout,
    records: Vec<i32>,
}

impl MemorySignal {
    /// Build from per-channel sample vectors; longer channels are cut to the shortest.
    pub fn from_channels(channels: Vec<Vec<i32>>) -> Self {
        let layout = RecordLayout::new(channels.len());
        let samples = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut records = Vec::with_capacity(samples * layout.channels());
        for i in 0..samples {
            records.extend(channels.iter().map(|c| c[i].to_le()));
        }
        MemorySignal { layout, records }
    }

    /// Build from native-order interleaved values; a trailing partial record is dropped.
    pub fn from_interleaved(layout: RecordLayout, mut values: Vec<i32>) -> Self {
        values.truncate(values.len() - values.len() % layout.channels());
        for v in &mut values {
            *v = v.to_le();
        }
        MemorySignal {
            layout,
            records: values,
        }
    }
}

impl SignalSource for MemorySignal {
    fn channel_count(&self) -> usize {
        self.layout.channels()
    }

    fn sample_count(&self) -> usize {
        self.records.len() / self.layout.channels()
    }

    fn channel(&self, channel: usize, start: usize, end: usize) -> Result<ChannelView<'_>> {
        if channel >= self.layout.channels() {
            return Err(Error::ChannelUnavailable {
                channel,
                channels: self.layout.channels(),
            });
        }
        let n = self.sample_count();
        let s = start.min(n);
        let e = end.clamp(s, n);
        let stride = self.layout.channels();
        Ok(ChannelView::interleaved(
            &self.records[s * stride..e * stride],
            stride,
            channel,
            s,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_interleaves() {
        let signal = MemorySignal::from_channels(vec![vec![1, 2, 3], vec![-1, -2, -3, -4]]);
        assert_eq!(signal.channel_count(), 2);
        assert_eq!(signal.sample_count(), 3);
        assert_eq!(signal.channel(1, 0, 10).unwrap().to_vec(), vec![-1, -2, -3]);
        assert_eq!(signal.channel(0, 1, 2).unwrap().to_vec(), vec![2]);
    }

    #[test]
    fn test_unavailable_channel() {
        let signal = MemorySignal::from_interleaved(RecordLayout::new(4), (0..16).collect());
        assert!(matches!(
            signal.channel(4, 0, 4),
            Err(Error::ChannelUnavailable { channel: 4, channels: 4 })
        ));
    }
}
