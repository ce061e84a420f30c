use std::iter::StepBy;
use std::slice::Iter;
use std::sync::Arc;

/// A read-only window onto one channel of a recording.
///
/// Mapped views borrow the interleaved records directly (no copy); owned
/// views hold values produced by a transform.
#[derive(Clone, Debug)]
pub struct ChannelView<'a> {
    start: usize,
    len: usize,
    samples: Samples<'a>,
}

#[derive(Clone, Debug)]
enum Samples<'a> {
    /// Little-endian records starting at sample `start`, `stride` values per record.
    Interleaved {
        records: &'a [i32],
        stride: usize,
        channel: usize,
    },
    Owned {
        values: Arc<[i32]>,
        offset: usize,
    },
}

impl<'a> ChannelView<'a> {
    /// View `channel` of `records`, whose first record is sample `start`.
    pub fn interleaved(records: &'a [i32], stride: usize, channel: usize, start: usize) -> Self {
        let stride = stride.max(1);
        ChannelView {
            start,
            len: records.len() / stride,
            samples: Samples::Interleaved {
                records,
                stride,
                channel,
            },
        }
    }

    /// Values already in native byte order, the first one being sample `start`.
    pub fn owned(start: usize, values: Vec<i32>) -> ChannelView<'static> {
        ChannelView {
            start,
            len: values.len(),
            samples: Samples::Owned {
                values: values.into(),
                offset: 0,
            },
        }
    }

    /// Absolute index of the first sample.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Absolute index one past the last sample.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the view borrows mapped storage rather than owning values.
    pub fn is_mapped(&self) -> bool {
        matches!(self.samples, Samples::Interleaved { .. })
    }

    /// Value at absolute sample index `sample`.
    pub fn at(&self, sample: usize) -> Option<i32> {
        let i = sample.checked_sub(self.start)?;
        if i >= self.len {
            return None;
        }
        match &self.samples {
            Samples::Interleaved {
                records,
                stride,
                channel,
            } => records.get(i * stride + channel).map(|v| i32::from_le(*v)),
            Samples::Owned { values, offset } => values.get(offset + i).copied(),
        }
    }

    pub fn iter(&self) -> ChannelIter<'_> {
        match &self.samples {
            Samples::Interleaved {
                records,
                stride,
                channel,
            } => ChannelIter {
                inner: records.get(*channel..).unwrap_or(&[]).iter().step_by(*stride),
                remaining: self.len,
                little_endian: true,
            },
            Samples::Owned { values, offset } => ChannelIter {
                inner: values[*offset..*offset + self.len].iter().step_by(1),
                remaining: self.len,
                little_endian: false,
            },
        }
    }

    /// `(absolute sample index, value)` pairs in order.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        (self.start..).zip(self.iter())
    }

    /// Sub-view over absolute samples `[start, end)`, clamped to this view.
    pub fn slice(&self, start: usize, end: usize) -> ChannelView<'a> {
        let s = start.clamp(self.start, self.end());
        let e = end.clamp(s, self.end());
        let rel = s - self.start;
        let len = e - s;
        let samples = match &self.samples {
            Samples::Interleaved {
                records,
                stride,
                channel,
            } => Samples::Interleaved {
                records: &records[rel * stride..(rel + len) * stride],
                stride: *stride,
                channel: *channel,
            },
            Samples::Owned { values, offset } => Samples::Owned {
                values: Arc::clone(values),
                offset: offset + rel,
            },
        };
        ChannelView {
            start: s,
            len,
            samples,
        }
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

pub struct ChannelIter<'b> {
    inner: StepBy<Iter<'b, i32>>,
    remaining: usize,
    little_endian: bool,
}

impl Iterator for ChannelIter<'_> {
    type Item = i32;

    #[inline]
    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let raw = *self.inner.next()?;
        Some(if self.little_endian {
            i32::from_le(raw)
        } else {
            raw
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
