//! Per-channel processing stages applied before reduction.
//!
//! A stage maps a channel view to a channel view. Stages that leave the data
//! untouched pass the mapped view through, so the common path stays zero-copy.

use crate::store::ChannelView;
use std::fmt;
use std::sync::Arc;

pub trait ChannelTransform: Send + Sync {
    fn name(&self) -> &str;

    fn apply<'a>(&self, view: ChannelView<'a>) -> ChannelView<'a>;
}

/// Identity stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl ChannelTransform for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn apply<'a>(&self, view: ChannelView<'a>) -> ChannelView<'a> {
        view
    }
}

/// Stages run in insertion order.
#[derive(Clone, Default)]
pub struct TransformChain {
    stages: Vec<Arc<dyn ChannelTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl ChannelTransform + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply<'a>(&self, view: ChannelView<'a>) -> ChannelView<'a> {
        if self.is_empty() {
            return view;
        }
        self.stages
            .iter()
            .fold(view, |view, stage| stage.apply(view))
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Negate;

    impl ChannelTransform for Negate {
        fn name(&self) -> &str {
            "negate"
        }

        fn apply<'a>(&self, view: ChannelView<'a>) -> ChannelView<'a> {
            ChannelView::owned(view.start(), view.iter().map(|v| -v).collect())
        }
    }

    #[test]
    fn test_passthrough_keeps_mapping() {
        let records: Vec<i32> = [1, 2, 3].iter().map(|v: &i32| v.to_le()).collect();
        let view = ChannelView::interleaved(&records, 1, 0, 0);
        let out = TransformChain::new().then(Passthrough).apply(view);
        assert!(out.is_mapped());
        assert_eq!(out.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_chain_returns_view_untouched() {
        let records: Vec<i32> = [4, 5, 6, 7].iter().map(|v: &i32| v.to_le()).collect();
        let chain = TransformChain::new();
        assert!(chain.is_empty());
        assert!(!chain.clone().then(Passthrough).is_empty());
        let out = chain.apply(ChannelView::interleaved(&records, 2, 1, 10));
        assert!(out.is_mapped());
        assert_eq!(out.indexed().collect::<Vec<_>>(), vec![(10, 5), (11, 7)]);
    }

    #[test]
    fn test_chain_runs_in_order() {
        let chain = TransformChain::new().then(Negate).then(Passthrough).then(Negate);
        assert_eq!(format!("{chain:?}"), r#"["negate", "passthrough", "negate"]"#);
        let out = chain.apply(ChannelView::owned(3, vec![1, -2]));
        assert_eq!(out.indexed().collect::<Vec<_>>(), vec![(3, 1), (4, -2)]);
    }
}
