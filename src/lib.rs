pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod downsample;
pub mod error;
pub mod pipeline;
pub mod range;
pub mod selector;
pub mod store;
pub mod transform;
pub mod tui;
pub mod worker;

pub use error::{Error, Result};
pub use pipeline::{RenderPipeline, RenderRequest, RenderResult};
pub use range::ViewRange;
pub use store::{SignalFile, SignalSource};

/// Open a four-channel BSR recording.
pub fn open(path: impl AsRef<std::path::Path>) -> Result<SignalFile> {
    SignalFile::open(path)
}
