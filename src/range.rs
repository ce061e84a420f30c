use crate::diagnostics::Diagnostic;
use serde::Serialize;
use std::fmt;

/// Half-open sample interval `[start, end)` with `start < end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ViewRange {
    start: usize,
    end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl ViewRange {
    /// Build a range that is already known to satisfy `start < end`.
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(ViewRange { start, end })
    }

    /// The whole recording `[0, samples)`.
    pub fn full(samples: usize) -> Self {
        ViewRange {
            start: 0,
            end: samples.max(1),
        }
    }

    /// Clamp an arbitrary requested interval into `[0, samples)`.
    ///
    /// Inverted or empty requests collapse to a single sample at the clamped
    /// start. Any adjustment is reported as `RangeClamped`.
    pub fn clamped(start: u64, end: u64, samples: usize) -> (Self, Option<Diagnostic>) {
        let samples = samples.max(1);
        let max = samples as u64;
        let s = start.min(max - 1);
        let e = end.min(max);
        let range = if e > s {
            ViewRange {
                start: s as usize,
                end: e as usize,
            }
        } else {
            ViewRange {
                start: s as usize,
                end: s as usize + 1,
            }
        };

        let diagnostic = (range.start as u64 != start || range.end as u64 != end).then_some(
            Diagnostic::RangeClamped {
                requested_start: start,
                requested_end: end,
                clamped: range,
            },
        );
        (range, diagnostic)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, other: &ViewRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Shift by `delta` samples, keeping the width and staying inside `[0, samples)`.
    pub fn panned(&self, delta: i64, samples: usize) -> Self {
        let width = self.len().min(samples.max(1));
        let max_start = samples.max(1) - width;
        let start = (self.start as i64 + delta).clamp(0, max_start as i64) as usize;
        ViewRange {
            start,
            end: start + width,
        }
    }

    /// Rescale the width by `factor` around the centre, staying inside `[0, samples)`.
    pub fn zoomed(&self, factor: f64, samples: usize) -> Self {
        let samples = samples.max(1);
        let width = ((self.len() as f64 * factor).round() as usize).clamp(1, samples);
        let centre = self.start + self.len() / 2;
        let start = centre.saturating_sub(width / 2).min(samples - width);
        ViewRange {
            start,
            end: start + width,
        }
    }
}

impl fmt::Display for ViewRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
