// =============================================================================
// Dashboard Views
// =============================================================================
//
// Exactly one view is active at a time. Each view owns the derived state it
// renders from and rebuilds it on every refresh tick from a fresh log
// snapshot; switching views drops the old view's state entirely and
// constructs the replacement from scratch.
//
//   Aggregate — fleet-wide rankings and a mean-vs-rate scatter
//   Series    — one device's signal history over a long window
//   Waterfall — per-interval mean strength matrix for a frozen device set

pub mod aggregate;
pub mod series;
pub mod waterfall;

pub use aggregate::{AggregateSnapshot, AggregateView};
pub use series::{SeriesSnapshot, SeriesView};
pub use waterfall::{WaterfallSnapshot, WaterfallView, PALETTES};

use serde::Serialize;

use crate::runtime_config::RuntimeConfig;
use crate::telemetry::Sample;
use crate::types::ViewKind;

// =============================================================================
// Tick context
// =============================================================================

/// Per-refresh inputs shared by all views: the wall-clock now, the tick
/// counter since the view was created, and whether this tick is a full
/// re-rank (views refresh cheap state every tick, expensive state only on
/// re-rank ticks).
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub now: f64,
    pub tick: u64,
    pub rerank: bool,
}

// =============================================================================
// ActiveView
// =============================================================================

/// The currently selected view and its state.
pub enum ActiveView {
    Aggregate(AggregateView),
    Series(SeriesView),
    Waterfall(WaterfallView),
}

impl ActiveView {
    /// Construct the view for `kind` and run its initial computation against
    /// the provided snapshot.
    pub fn create(kind: ViewKind, samples: &[Sample], config: &RuntimeConfig, now: f64) -> Self {
        match kind {
            ViewKind::Aggregate => Self::Aggregate(AggregateView::new(samples, config, now)),
            ViewKind::Series => Self::Series(SeriesView::new(samples, config, now)),
            ViewKind::Waterfall => Self::Waterfall(WaterfallView::new(samples, config, now)),
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            Self::Aggregate(_) => ViewKind::Aggregate,
            Self::Series(_) => ViewKind::Series,
            Self::Waterfall(_) => ViewKind::Waterfall,
        }
    }

    /// Rebuild this view's derived state from a fresh snapshot.
    pub fn refresh(&mut self, samples: &[Sample], config: &RuntimeConfig, ctx: TickContext) {
        match self {
            Self::Aggregate(view) => view.refresh(samples, config, ctx),
            Self::Series(view) => view.refresh(samples, config, ctx),
            Self::Waterfall(view) => view.refresh(samples, config, ctx),
        }
    }

    /// Serializable copy of the view's current derived state.
    pub fn render(&self) -> ViewSnapshot {
        match self {
            Self::Aggregate(view) => ViewSnapshot::Aggregate(view.render()),
            Self::Series(view) => ViewSnapshot::Series(view.render()),
            Self::Waterfall(view) => ViewSnapshot::Waterfall(view.render()),
        }
    }

    /// Point the series view at a specific device. Returns `false` when the
    /// active view is not the series view.
    pub fn select_device(&mut self, device_id: &str) -> bool {
        match self {
            Self::Series(view) => {
                view.select_device(device_id);
                true
            }
            _ => false,
        }
    }

    /// Change the waterfall palette. Returns `false` when the active view is
    /// not the waterfall or the name is not a known palette.
    pub fn set_palette(&mut self, name: &str) -> bool {
        match self {
            Self::Waterfall(view) => view.set_palette(name),
            _ => false,
        }
    }
}

// =============================================================================
// Wire representation
// =============================================================================

/// Tagged render model pushed to clients; `kind` tells the frontend which
/// panel layout to draw.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ViewSnapshot {
    Aggregate(AggregateSnapshot),
    Series(SeriesSnapshot),
    Waterfall(WaterfallSnapshot),
}
