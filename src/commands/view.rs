use super::open_recording;
use crate::config::{ChannelConfig, EngineConfig};
use crate::error::Result;
use crate::store::RecordLayout;
use std::path::Path;

pub fn run(
    file: &Path,
    layout: RecordLayout,
    config: ChannelConfig,
    engine: EngineConfig,
) -> Result<()> {
    let signal = open_recording(file, layout)?;
    crate::tui::run(signal, config, engine)
}
