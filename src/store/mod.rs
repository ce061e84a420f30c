//! Read-only access to BSR recordings.
//!
//! A BSR file is a flat array of little-endian `i32` values, interleaved as
//! rows of one value per channel. There is no header; the sample count is
//! derived from the file size.

mod file;
mod memory;
mod view;

pub use file::SignalFile;
pub use memory::MemorySignal;
pub use view::{ChannelIter, ChannelView};

use crate::error::Result;

pub const DEFAULT_CHANNELS: usize = 4;
pub const SAMPLE_BYTES: usize = std::mem::size_of::<i32>();

/// Shape of one record (one sample across all channels).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    channels: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        RecordLayout {
            channels: DEFAULT_CHANNELS,
        }
    }
}

impl RecordLayout {
    pub fn new(channels: usize) -> Self {
        RecordLayout {
            channels: channels.max(1),
        }
    }

    /// Values per record; never zero.
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn record_bytes(&self) -> usize {
        self.channels * SAMPLE_BYTES
    }
}

/// Anything that can hand out zero-copy channel views.
///
/// Implementations must be immutable for their lifetime so concurrent
/// readers never need a lock.
pub trait SignalSource: Send + Sync {
    fn channel_count(&self) -> usize;

    fn sample_count(&self) -> usize;

    /// Samples `[start, end)` of `channel`, clamped to `[0, sample_count)`.
    ///
    /// Fails with `ChannelUnavailable` for `channel >= channel_count`, and with
    /// a retryable `Io` error if the backing storage is no longer readable.
    fn channel(&self, channel: usize, start: usize, end: usize) -> Result<ChannelView<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_never_has_zero_channels() {
        let layout = RecordLayout::new(0);
        assert_eq!(layout.channels(), 1);
        assert_eq!(layout.record_bytes(), SAMPLE_BYTES);
        assert_eq!(RecordLayout::default().record_bytes(), 16);
    }
}
