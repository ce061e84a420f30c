//! Extrema-preserving min/max reduction.
//!
//! Each bucket keeps its minimum and maximum together with the sample index
//! where they occur, so the drawn envelope always contains every raw value
//! of the bucket. Output points are in sample order.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::store::ChannelView;
use serde::Serialize;

/// Samples scanned between cancellation checks when no chunk size is given.
pub const DEFAULT_CHUNK: usize = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Point {
    pub index: usize,
    pub value: i32,
}

/// Reduction of the samples `[start, end)` of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub start: usize,
    pub end: usize,
    pub min: Point,
    pub max: Point,
}

impl Bucket {
    fn seed(index: usize, value: i32) -> Self {
        let p = Point { index, value };
        Bucket {
            start: index,
            end: index + 1,
            min: p,
            max: p,
        }
    }

    #[inline]
    fn push(&mut self, index: usize, value: i32) {
        // Strict comparisons keep the first occurrence of each extremum.
        if value < self.min.value {
            self.min = Point { index, value };
        }
        if value > self.max.value {
            self.max = Point { index, value };
        }
        self.end = index + 1;
    }

    /// One or two points, earliest first. A bucket whose extrema coincide
    /// (single sample, constant run) yields a single point.
    pub fn points(&self) -> impl Iterator<Item = Point> {
        let (first, second) = if self.min.index <= self.max.index {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        let second = (second.index != first.index).then_some(second);
        std::iter::once(first).chain(second)
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Reduce `view` to at most `2 * bucket_count` points.
///
/// The view is split into `bucket_count` contiguous, equal-width buckets; the
/// last one absorbs the remainder. Views shorter than `bucket_count` come back
/// verbatim.
pub fn downsample(view: &ChannelView<'_>, bucket_count: usize) -> Vec<Point> {
    flatten(&buckets(view, bucket_count))
}

/// The buckets behind [`downsample`].
pub fn buckets(view: &ChannelView<'_>, bucket_count: usize) -> Vec<Bucket> {
    let len = view.len();
    if len == 0 || bucket_count == 0 {
        return Vec::new();
    }
    let count = bucket_count.min(len);
    let width = len / count;

    let mut out = Vec::with_capacity(count);
    let mut current: Option<Bucket> = None;
    for (index, value) in view.indexed() {
        // Bucket number, with everything past the last boundary folded into the last bucket.
        let slot = ((index - view.start()) / width).min(count - 1);
        match current.as_mut() {
            Some(b) if (b.start - view.start()) / width == slot => b.push(index, value),
            _ => {
                if let Some(done) = current.take() {
                    out.push(done);
                }
                current = Some(Bucket::seed(index, value));
            }
        }
    }
    out.extend(current);
    out
}

/// Fixed-width buckets aligned to absolute multiples of `width`.
///
/// Computes buckets `first..last` (bucket `k` covers `[k*width, (k+1)*width)`
/// intersected with the view) and checks `cancel` every `chunk` samples.
pub fn reduce_grid(
    view: &ChannelView<'_>,
    width: usize,
    first: usize,
    last: usize,
    chunk: usize,
    cancel: &CancelToken,
) -> Result<Vec<Bucket>> {
    let width = width.max(1);
    let chunk = chunk.max(1);
    let mut out = Vec::with_capacity(last.saturating_sub(first));
    let mut since_check = 0usize;

    for k in first..last {
        let sub = view.slice(k * width, (k + 1) * width);
        let mut iter = sub.indexed();
        let Some((index, value)) = iter.next() else {
            continue;
        };
        let mut bucket = Bucket::seed(index, value);
        for (index, value) in iter {
            bucket.push(index, value);
        }
        out.push(bucket);

        since_check += sub.len();
        if since_check >= chunk {
            since_check = 0;
            cancel.check()?;
        }
    }
    cancel.check()?;
    Ok(out)
}

/// Whole-view extrema and sum, scanned in cancellable chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extrema {
    pub bucket: Bucket,
    pub sum: i64,
}

impl Extrema {
    pub fn mean(&self) -> f64 {
        self.sum as f64 / self.bucket.width().max(1) as f64
    }
}

/// Full-resolution pass over `view`, with `progress` called after each chunk
/// with the number of samples scanned so far.
pub fn scan_extrema(
    view: &ChannelView<'_>,
    chunk: usize,
    cancel: &CancelToken,
    mut progress: impl FnMut(usize),
) -> Result<Option<Extrema>> {
    let chunk = chunk.max(1);
    let mut acc: Option<Extrema> = None;
    let mut pos = view.start();

    while pos < view.end() {
        let part = view.slice(pos, pos.saturating_add(chunk));
        for (index, value) in part.indexed() {
            match acc.as_mut() {
                Some(e) => {
                    e.bucket.push(index, value);
                    e.sum += value as i64;
                }
                None => {
                    acc = Some(Extrema {
                        bucket: Bucket::seed(index, value),
                        sum: value as i64,
                    })
                }
            }
        }
        pos = part.end();
        progress(pos - view.start());
        cancel.check()?;
    }
    Ok(acc)
}

/// Flatten buckets into their ordered points.
pub fn flatten(buckets: &[Bucket]) -> Vec<Point> {
    let mut points = Vec::with_capacity(buckets.len() * 2);
    for bucket in buckets {
        points.extend(bucket.points());
    }
    points
}
