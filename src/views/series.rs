// =============================================================================
// Series View — one device's signal history
// =============================================================================
//
// Tracks a single selected device. When nothing is selected (fresh view on an
// empty log, typically) the view stays pending and retries auto-selection on
// every refresh until samples arrive; auto-selection picks the device with
// the strongest whole-log mean.
//
// The trace uses the long series window; the stats strip and the device
// picker use the shorter rate window, so the rate reflects recent behaviour
// rather than the whole trace.

use serde::Serialize;
use tracing::info;

use crate::runtime_config::RuntimeConfig;
use crate::telemetry::window::{
    device_aggregate, device_aggregates, device_series, strongest_device, top_by_rate,
    AggregateRow, SeriesPoint,
};
use crate::telemetry::Sample;
use crate::views::TickContext;

pub struct SeriesView {
    selected: Option<String>,
    points: Vec<SeriesPoint>,
    stats: Option<AggregateRow>,
    /// Device picker: busiest devices over the rate window.
    choices: Vec<AggregateRow>,
}

impl SeriesView {
    pub fn new(samples: &[Sample], config: &RuntimeConfig, now: f64) -> Self {
        let mut view = Self {
            selected: None,
            points: Vec::new(),
            stats: None,
            choices: Vec::new(),
        };
        view.refresh(
            samples,
            config,
            TickContext {
                now,
                tick: 0,
                rerank: true,
            },
        );
        view
    }

    pub fn refresh(&mut self, samples: &[Sample], config: &RuntimeConfig, ctx: TickContext) {
        if self.selected.is_none() {
            if let Some(device_id) = strongest_device(samples) {
                info!(device = %device_id, "series view auto-selected strongest device");
                self.selected = Some(device_id);
            }
        }

        if let Some(device_id) = &self.selected {
            self.points =
                device_series(samples, device_id, ctx.now, config.windows.series_window_secs);
            self.stats = device_aggregate(
                samples,
                device_id,
                ctx.now,
                config.windows.series_rate_window_secs,
            );
        }

        if ctx.rerank {
            let rows = device_aggregates(samples, ctx.now, config.windows.series_rate_window_secs);
            self.choices = top_by_rate(rows, config.ranking.series_choice_size);
        }
    }

    /// Switch to an explicit device. Stale trace data is cleared here; the
    /// caller refreshes immediately afterwards to fill in the new device.
    pub fn select_device(&mut self, device_id: &str) {
        self.selected = Some(device_id.to_string());
        self.points.clear();
        self.stats = None;
    }

    pub fn render(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            selected: self.selected.clone(),
            points: self.points.clone(),
            stats: self.stats.clone(),
            choices: self.choices.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    /// `None` while the view is pending auto-selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub points: Vec<SeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AggregateRow>,
    pub choices: Vec<AggregateRow>,
}
