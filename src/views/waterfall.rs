// =============================================================================
// Waterfall View — per-interval strength matrix
// =============================================================================
//
// Samples a device subset once, then freezes it: every column belongs to one
// tracked device for the lifetime of the view, so rows stay comparable as the
// matrix scrolls. The subset is drawn without replacement from the devices
// seen so far, capped; if the log is still empty the view stays pending and
// retries on each refresh.
//
// Each refresh appends one row covering the interval since the previous
// refresh — `(last_cutoff, now]`, so consecutive rows tile time with no gap
// and no overlap. A tracked device that was silent in the interval renders at
// the floor value rather than dropping out.

use std::collections::{HashSet, VecDeque};

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{info, warn};

use crate::runtime_config::RuntimeConfig;
use crate::telemetry::window::incremental_means;
use crate::telemetry::Sample;
use crate::views::TickContext;

/// Colour maps the frontend knows how to draw.
pub const PALETTES: &[&str] = &[
    "CMRmap", "Spectral", "hot", "jet", "plasma", "viridis", "winter_r",
];

/// Colour scale endpoints, dBm. Values outside clamp to the scale ends.
pub const RENDER_MIN_DBM: f64 = -90.0;
pub const RENDER_MAX_DBM: f64 = -20.0;

pub struct WaterfallView {
    /// Frozen device set, id order. Empty means pending.
    tracked: Vec<String>,
    /// Oldest row first; always `rows` long once tracked.
    matrix: VecDeque<Vec<f64>>,
    /// Upper bound of the last appended interval.
    last_cutoff: f64,
    palette: String,
    rows: usize,
    floor: f64,
}

impl WaterfallView {
    pub fn new(samples: &[Sample], config: &RuntimeConfig, now: f64) -> Self {
        let palette = if PALETTES.contains(&config.waterfall.palette.as_str()) {
            config.waterfall.palette.clone()
        } else {
            warn!(
                palette = %config.waterfall.palette,
                "unknown waterfall palette in config, using viridis"
            );
            "viridis".to_string()
        };

        let mut view = Self {
            tracked: Vec::new(),
            matrix: VecDeque::new(),
            last_cutoff: now,
            palette,
            rows: config.waterfall.matrix_rows.max(1),
            floor: config.waterfall.missing_floor_dbm,
        };
        view.try_sample(samples, config, now);
        view
    }

    pub fn refresh(&mut self, samples: &[Sample], config: &RuntimeConfig, ctx: TickContext) {
        if self.tracked.is_empty() {
            // Still pending. If sampling succeeds now, rows start next tick so
            // the first interval begins at this instant.
            self.try_sample(samples, config, ctx.now);
            return;
        }

        let means = incremental_means(samples, self.last_cutoff, ctx.now);
        let row: Vec<f64> = self
            .tracked
            .iter()
            .map(|device_id| means.get(device_id).copied().unwrap_or(self.floor))
            .collect();

        self.matrix.push_back(row);
        while self.matrix.len() > self.rows {
            self.matrix.pop_front();
        }
        self.last_cutoff = ctx.now;
    }

    /// Draw the tracked set from the devices seen so far. No-op while the log
    /// has no devices yet.
    fn try_sample(&mut self, samples: &[Sample], config: &RuntimeConfig, now: f64) {
        let mut ids: Vec<String> = samples
            .iter()
            .map(|s| s.device_id.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return;
        }
        ids.sort();

        let cap = config.waterfall.tracked_device_cap.min(ids.len());
        let mut tracked: Vec<String> = ids
            .choose_multiple(&mut rand::thread_rng(), cap)
            .cloned()
            .collect();
        tracked.sort();

        self.matrix = (0..self.rows)
            .map(|_| vec![self.floor; tracked.len()])
            .collect();
        self.tracked = tracked;
        self.last_cutoff = now;
        info!(
            devices = self.tracked.len(),
            rows = self.rows,
            "waterfall locked tracked device set"
        );
    }

    /// Returns `false` (and keeps the current palette) for unknown names.
    pub fn set_palette(&mut self, name: &str) -> bool {
        if PALETTES.contains(&name) {
            self.palette = name.to_string();
            true
        } else {
            false
        }
    }

    pub fn render(&self) -> WaterfallSnapshot {
        WaterfallSnapshot {
            pending: self.tracked.is_empty(),
            devices: self.tracked.clone(),
            matrix: self.matrix.iter().cloned().collect(),
            palette: self.palette.clone(),
            palette_choices: PALETTES,
            render_min_dbm: RENDER_MIN_DBM,
            render_max_dbm: RENDER_MAX_DBM,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterfallSnapshot {
    /// `true` until a device set has been locked.
    pub pending: bool,
    /// Column order of `matrix`.
    pub devices: Vec<String>,
    /// Oldest row first.
    pub matrix: Vec<Vec<f64>>,
    pub palette: String,
    pub palette_choices: &'static [&'static str],
    pub render_min_dbm: f64,
    pub render_max_dbm: f64,
}
