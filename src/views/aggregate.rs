// =============================================================================
// Aggregate View — fleet-wide overview
// =============================================================================
//
// Three panels driven by two windows:
//
//   header   — whole-log totals plus short-window mean/rate, every tick
//   rankings — strongest / busiest devices over the ranking window, re-rank
//              ticks only (they are the expensive part)
//   scatter  — every in-window device as a (mean, rate) point, untruncated,
//              rebuilt together with the rankings

use serde::Serialize;

use crate::runtime_config::RuntimeConfig;
use crate::telemetry::window::{
    device_aggregates, global_stats, top_by_rate, top_by_strength, AggregateRow, GlobalStats,
};
use crate::telemetry::Sample;
use crate::views::TickContext;

pub struct AggregateView {
    header: GlobalStats,
    /// Strongest devices, ascending mean order (weakest keeper first).
    strength_ranking: Vec<AggregateRow>,
    /// Busiest devices, descending rate order.
    rate_ranking: Vec<AggregateRow>,
    /// All in-window devices, id order. Never truncated.
    scatter: Vec<AggregateRow>,
}

impl AggregateView {
    pub fn new(samples: &[Sample], config: &RuntimeConfig, now: f64) -> Self {
        let mut view = Self {
            header: global_stats(samples, now, config.windows.header_window_secs),
            strength_ranking: Vec::new(),
            rate_ranking: Vec::new(),
            scatter: Vec::new(),
        };
        view.rerank(samples, config, now);
        view
    }

    pub fn refresh(&mut self, samples: &[Sample], config: &RuntimeConfig, ctx: TickContext) {
        self.header = global_stats(samples, ctx.now, config.windows.header_window_secs);
        if ctx.rerank {
            self.rerank(samples, config, ctx.now);
        }
    }

    fn rerank(&mut self, samples: &[Sample], config: &RuntimeConfig, now: f64) {
        let rows = device_aggregates(samples, now, config.windows.ranking_window_secs);
        self.strength_ranking = top_by_strength(rows.clone(), config.ranking.strength_rank_size);
        self.rate_ranking = top_by_rate(rows.clone(), config.ranking.rate_rank_size);
        self.scatter = rows;
    }

    pub fn render(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            header: self.header.clone(),
            strength_ranking: self.strength_ranking.clone(),
            rate_ranking: self.rate_ranking.clone(),
            scatter: self.scatter.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    pub header: GlobalStats,
    pub strength_ranking: Vec<AggregateRow>,
    pub rate_ranking: Vec<AggregateRow>,
    pub scatter: Vec<AggregateRow>,
}
