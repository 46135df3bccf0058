// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the BTScan engine.  Window lengths, refresh
// cadences, ranking sizes and the simulated-adapter shape all live here so
// that the engine can be reconfigured at runtime without a restart.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scanner::ScanFilter;
use crate::types::ViewKind;

/// Where the engine reads and persists its configuration.
pub const CONFIG_PATH: &str = "btscan_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_header_window_secs() -> f64 {
    5.0
}

fn default_ranking_window_secs() -> f64 {
    10.0
}

fn default_series_window_secs() -> f64 {
    120.0
}

fn default_series_rate_window_secs() -> f64 {
    25.0
}

fn default_aggregate_period_ms() -> u64 {
    100
}

fn default_series_period_ms() -> u64 {
    4
}

fn default_waterfall_period_ms() -> u64 {
    4
}

fn default_aggregate_rerank_ticks() -> u64 {
    5
}

fn default_series_rerank_ticks() -> u64 {
    10
}

fn default_strength_rank_size() -> usize {
    25
}

fn default_rate_rank_size() -> usize {
    8
}

fn default_series_choice_size() -> usize {
    30
}

fn default_matrix_rows() -> usize {
    100
}

fn default_tracked_device_cap() -> usize {
    50
}

fn default_missing_floor_dbm() -> f64 {
    -100.0
}

fn default_palette() -> String {
    "viridis".to_string()
}

fn default_sim_device_count() -> usize {
    12
}

fn default_sim_emit_interval_ms() -> u64 {
    40
}

// =============================================================================
// WindowParams
// =============================================================================

/// Sliding-window lengths, seconds. Each consumer names its own window so
/// they can be tuned independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowParams {
    /// Aggregate header: short window for the "right now" mean and rate.
    #[serde(default = "default_header_window_secs")]
    pub header_window_secs: f64,

    /// Aggregate rankings and scatter.
    #[serde(default = "default_ranking_window_secs")]
    pub ranking_window_secs: f64,

    /// Series trace length.
    #[serde(default = "default_series_window_secs")]
    pub series_window_secs: f64,

    /// Series stats strip and device picker rates.
    #[serde(default = "default_series_rate_window_secs")]
    pub series_rate_window_secs: f64,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            header_window_secs: default_header_window_secs(),
            ranking_window_secs: default_ranking_window_secs(),
            series_window_secs: default_series_window_secs(),
            series_rate_window_secs: default_series_rate_window_secs(),
        }
    }
}

// =============================================================================
// ViewTimings
// =============================================================================

/// Per-view refresh cadence and re-rank stride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewTimings {
    #[serde(default = "default_aggregate_period_ms")]
    pub aggregate_period_ms: u64,

    #[serde(default = "default_series_period_ms")]
    pub series_period_ms: u64,

    #[serde(default = "default_waterfall_period_ms")]
    pub waterfall_period_ms: u64,

    /// Every Nth aggregate tick rebuilds the rankings.
    #[serde(default = "default_aggregate_rerank_ticks")]
    pub aggregate_rerank_ticks: u64,

    /// Every Nth series tick rebuilds the device picker.
    #[serde(default = "default_series_rerank_ticks")]
    pub series_rerank_ticks: u64,
}

impl ViewTimings {
    /// Refresh period for a view, clamped to at least 1 ms.
    pub fn period_ms(&self, kind: ViewKind) -> u64 {
        let period = match kind {
            ViewKind::Aggregate => self.aggregate_period_ms,
            ViewKind::Series => self.series_period_ms,
            ViewKind::Waterfall => self.waterfall_period_ms,
        };
        period.max(1)
    }

    /// Re-rank stride for a view, clamped to at least 1. The waterfall
    /// appends a row every tick, so its stride is fixed.
    pub fn rerank_ticks(&self, kind: ViewKind) -> u64 {
        let ticks = match kind {
            ViewKind::Aggregate => self.aggregate_rerank_ticks,
            ViewKind::Series => self.series_rerank_ticks,
            ViewKind::Waterfall => 1,
        };
        ticks.max(1)
    }
}

impl Default for ViewTimings {
    fn default() -> Self {
        Self {
            aggregate_period_ms: default_aggregate_period_ms(),
            series_period_ms: default_series_period_ms(),
            waterfall_period_ms: default_waterfall_period_ms(),
            aggregate_rerank_ticks: default_aggregate_rerank_ticks(),
            series_rerank_ticks: default_series_rerank_ticks(),
        }
    }
}

// =============================================================================
// RankingParams
// =============================================================================

/// How many devices each ranked list keeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingParams {
    /// Aggregate view: strongest devices by windowed mean.
    #[serde(default = "default_strength_rank_size")]
    pub strength_rank_size: usize,

    /// Aggregate view: busiest devices by advertisement rate.
    #[serde(default = "default_rate_rank_size")]
    pub rate_rank_size: usize,

    /// Series view device picker.
    #[serde(default = "default_series_choice_size")]
    pub series_choice_size: usize,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            strength_rank_size: default_strength_rank_size(),
            rate_rank_size: default_rate_rank_size(),
            series_choice_size: default_series_choice_size(),
        }
    }
}

// =============================================================================
// WaterfallParams
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallParams {
    /// Matrix height; one row per refresh tick.
    #[serde(default = "default_matrix_rows")]
    pub matrix_rows: usize,

    /// Maximum devices sampled into the tracked set.
    #[serde(default = "default_tracked_device_cap")]
    pub tracked_device_cap: usize,

    /// Cell value for a tracked device with no samples in an interval, dBm.
    #[serde(default = "default_missing_floor_dbm")]
    pub missing_floor_dbm: f64,

    /// Startup colour map.
    #[serde(default = "default_palette")]
    pub palette: String,
}

impl Default for WaterfallParams {
    fn default() -> Self {
        Self {
            matrix_rows: default_matrix_rows(),
            tracked_device_cap: default_tracked_device_cap(),
            missing_floor_dbm: default_missing_floor_dbm(),
            palette: default_palette(),
        }
    }
}

// =============================================================================
// SimulatorParams
// =============================================================================

/// Shape of the simulated adapter's traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorParams {
    #[serde(default = "default_sim_device_count")]
    pub device_count: usize,

    /// Base delay between advertisements; the loop jitters around this.
    #[serde(default = "default_sim_emit_interval_ms")]
    pub emit_interval_ms: u64,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            device_count: default_sim_device_count(),
            emit_interval_ms: default_sim_emit_interval_ms(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the BTScan engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Discovery parameters handed to the adapter.
    #[serde(default)]
    pub scan_filter: ScanFilter,

    #[serde(default)]
    pub windows: WindowParams,

    #[serde(default)]
    pub timings: ViewTimings,

    #[serde(default)]
    pub ranking: RankingParams,

    #[serde(default)]
    pub waterfall: WaterfallParams,

    #[serde(default)]
    pub simulator: SimulatorParams,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scan_filter: ScanFilter::default(),
            windows: WindowParams::default(),
            timings: ViewTimings::default(),
            ranking: RankingParams::default(),
            waterfall: WaterfallParams::default(),
            simulator: SimulatorParams::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            sim_devices = config.simulator.device_count,
            palette = %config.waterfall.palette,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert!((cfg.windows.header_window_secs - 5.0).abs() < f64::EPSILON);
        assert!((cfg.windows.ranking_window_secs - 10.0).abs() < f64::EPSILON);
        assert!((cfg.windows.series_window_secs - 120.0).abs() < f64::EPSILON);
        assert!((cfg.windows.series_rate_window_secs - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.timings.aggregate_period_ms, 100);
        assert_eq!(cfg.ranking.strength_rank_size, 25);
        assert_eq!(cfg.ranking.rate_rank_size, 8);
        assert_eq!(cfg.waterfall.matrix_rows, 100);
        assert_eq!(cfg.waterfall.tracked_device_cap, 50);
        assert!((cfg.waterfall.missing_floor_dbm - (-100.0)).abs() < f64::EPSILON);
        assert_eq!(cfg.waterfall.palette, "viridis");
        assert_eq!(cfg.scan_filter.transport, "le");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.timings.series_period_ms, 4);
        assert_eq!(cfg.timings.waterfall_period_ms, 4);
        assert_eq!(cfg.ranking.series_choice_size, 30);
        assert_eq!(cfg.simulator.device_count, 12);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "waterfall": { "matrix_rows": 20 }, "simulator": { "device_count": 3 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.waterfall.matrix_rows, 20);
        assert_eq!(cfg.waterfall.palette, "viridis");
        assert_eq!(cfg.simulator.device_count, 3);
        assert_eq!(cfg.simulator.emit_interval_ms, 40);
        assert_eq!(cfg.timings.aggregate_rerank_ticks, 5);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.waterfall.palette, cfg2.waterfall.palette);
        assert_eq!(cfg.timings.aggregate_period_ms, cfg2.timings.aggregate_period_ms);
        assert!((cfg.windows.series_window_secs - cfg2.windows.series_window_secs).abs()
            < f64::EPSILON);
    }

    #[test]
    fn timings_dispatch_per_view() {
        let timings = ViewTimings::default();
        assert_eq!(timings.period_ms(ViewKind::Aggregate), 100);
        assert_eq!(timings.period_ms(ViewKind::Series), 4);
        assert_eq!(timings.period_ms(ViewKind::Waterfall), 4);
        assert_eq!(timings.rerank_ticks(ViewKind::Aggregate), 5);
        assert_eq!(timings.rerank_ticks(ViewKind::Series), 10);
        assert_eq!(timings.rerank_ticks(ViewKind::Waterfall), 1);
    }

    #[test]
    fn zeroed_timings_are_clamped() {
        let mut timings = ViewTimings::default();
        timings.series_period_ms = 0;
        timings.aggregate_rerank_ticks = 0;
        assert_eq!(timings.period_ms(ViewKind::Series), 1);
        assert_eq!(timings.rerank_ticks(ViewKind::Aggregate), 1);
    }
}
