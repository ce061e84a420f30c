mod app;
mod ui;

use crate::config::{ChannelConfig, EngineConfig};
use crate::error::Result;
use crate::store::SignalFile;

pub use app::{App, PlotLayout};

/// Run the interactive viewer on an opened recording
pub fn run(signal: SignalFile, config: ChannelConfig, engine: EngineConfig) -> Result<()> {
    let title = signal
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| signal.path().display().to_string());
    let warning = signal.truncation().map(|d| d.to_string());
    let mut app = App::new(signal, title, config, engine).with_warning(warning);
    app.run()
}
