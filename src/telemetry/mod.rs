// =============================================================================
// Telemetry Module
// =============================================================================
//
// The aggregation kernel of the engine:
// - an append-only, concurrently-appended sample log (single source of truth)
// - pure sliding-window aggregation over log snapshots
// - CSV export of the log

pub mod export;
pub mod log;
pub mod window;

pub use log::{Sample, SampleLog, SessionInfo};
pub use window::{AggregateRow, GlobalStats, SeriesPoint};

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Sample timestamps, window cutoffs and export filenames all use this scale.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
