//! Non-fatal conditions surfaced to the caller next to a result.

use crate::range::ViewRange;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The file ended in a partial record, which was dropped.
    TruncationWarning { dropped_bytes: u64, samples: usize },
    /// A requested range fell outside the recording and was clamped.
    RangeClamped {
        requested_start: u64,
        requested_end: u64,
        clamped: ViewRange,
    },
    /// A zero point budget was raised to the minimum.
    BudgetClamped { requested: usize, used: usize },
}

impl Diagnostic {
    pub fn log(&self) {
        log::warn!("{self}");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TruncationWarning {
                dropped_bytes,
                samples,
            } => write!(
                f,
                "trailing partial record dropped ({dropped_bytes} bytes), {samples} complete samples"
            ),
            Diagnostic::RangeClamped {
                requested_start,
                requested_end,
                clamped,
            } => write!(
                f,
                "range [{requested_start}, {requested_end}) clamped to {clamped}"
            ),
            Diagnostic::BudgetClamped { requested, used } => {
                write!(f, "point budget {requested} raised to {used}")
            }
        }
    }
}
