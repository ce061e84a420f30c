//! Per-request orchestration over the active channels.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostic;
use crate::downsample::Point;
use crate::error::{Error, Result};
use crate::range::ViewRange;
use crate::selector::{Mode, ResolutionSelector};
use crate::store::SignalSource;
use crate::transform::TransformChain;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One frame's worth of work: a requested sample interval, the channels the
/// caller currently shows, and how many points it can draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    /// Requested bounds; clamped into a valid `ViewRange` at render time.
    pub start: u64,
    pub end: u64,
    pub channels: BTreeSet<usize>,
    pub point_budget: usize,
}

impl RenderRequest {
    pub fn new(
        start: u64,
        end: u64,
        channels: impl IntoIterator<Item = usize>,
        point_budget: usize,
    ) -> Self {
        RenderRequest {
            start,
            end,
            channels: channels.into_iter().collect(),
            point_budget,
        }
    }

    pub fn for_range(
        range: ViewRange,
        channels: impl IntoIterator<Item = usize>,
        point_budget: usize,
    ) -> Self {
        Self::new(
            range.start() as u64,
            range.end() as u64,
            channels,
            point_budget,
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChannelRender {
    pub channel: usize,
    pub mode: Mode,
    /// Samples per bucket in reduced mode.
    pub bucket_width: Option<usize>,
    /// In reduced mode these come from whole grid buckets, so the first and
    /// last points may fall just outside the requested range; clip to draw.
    pub points: Vec<Point>,
}

#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: usize,
    pub result: Result<ChannelRender>,
}

#[derive(Debug)]
pub struct RenderResult {
    pub range: ViewRange,
    pub point_budget: usize,
    pub channels: Vec<ChannelOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderResult {
    pub fn get(&self, channel: usize) -> Option<&ChannelRender> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .and_then(|c| c.result.as_ref().ok())
    }

    pub fn renders(&self) -> impl Iterator<Item = &ChannelRender> {
        self.channels.iter().filter_map(|c| c.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.channels
            .iter()
            .filter_map(|c| c.result.as_ref().err().map(|e| (c.channel, e)))
    }

    /// At least one requested channel failed while others may have succeeded.
    pub fn is_partial_failure(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Renders requests against one recording, keeping a reduction cache per channel.
pub struct RenderPipeline<S: ?Sized> {
    selector: ResolutionSelector,
    transforms: Vec<TransformChain>,
    source: Arc<S>,
}

impl<S: SignalSource + ?Sized> RenderPipeline<S> {
    pub fn new(source: Arc<S>, config: EngineConfig) -> Self {
        let channels = source.channel_count();
        RenderPipeline {
            selector: ResolutionSelector::new(channels, config),
            transforms: vec![TransformChain::new(); channels],
            source,
        }
    }

    /// Install the processing chain for `channel`, dropping its cached reductions.
    pub fn set_transform(&mut self, channel: usize, chain: TransformChain) -> Result<()> {
        let channels = self.transforms.len();
        let slot = self
            .transforms
            .get_mut(channel)
            .ok_or(Error::ChannelUnavailable { channel, channels })?;
        *slot = chain;
        self.selector.invalidate(channel);
        Ok(())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn selector(&self) -> &ResolutionSelector {
        &self.selector
    }

    pub fn sample_count(&self) -> usize {
        self.source.sample_count()
    }

    /// Render every requested channel; inactive channels are never touched.
    ///
    /// Per-channel failures are reported in the result. The call as a whole
    /// fails only with `Cancelled`, when `cancel` was superseded, in which
    /// case nothing it computed was published.
    pub fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<RenderResult> {
        let mut diagnostics = Vec::new();

        let (range, clamped) =
            ViewRange::clamped(request.start, request.end, self.source.sample_count());
        diagnostics.extend(clamped);

        let budget = request.point_budget.max(1);
        if budget != request.point_budget {
            diagnostics.push(Diagnostic::BudgetClamped {
                requested: request.point_budget,
                used: budget,
            });
        }
        for diagnostic in &diagnostics {
            diagnostic.log();
        }

        let mut channels = Vec::with_capacity(request.channels.len());
        for &channel in &request.channels {
            let result = self.render_channel(channel, range, budget, cancel);
            match &result {
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => log::warn!("ch{channel}: {e}"),
                Ok(_) => {}
            }
            channels.push(ChannelOutcome { channel, result });
        }

        Ok(RenderResult {
            range,
            point_budget: budget,
            channels,
            diagnostics,
        })
    }

    fn render_channel(
        &self,
        channel: usize,
        range: ViewRange,
        budget: usize,
        cancel: &CancelToken,
    ) -> Result<ChannelRender> {
        let channels = self.source.channel_count();
        let transforms = self
            .transforms
            .get(channel)
            .ok_or(Error::ChannelUnavailable { channel, channels })?;
        let selection =
            self.selector
                .select(&*self.source, transforms, channel, range, budget, cancel)?;
        Ok(ChannelRender {
            channel,
            mode: selection.mode,
            bucket_width: selection.bucket_width,
            points: selection.points,
        })
    }
}
