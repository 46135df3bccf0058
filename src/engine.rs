// =============================================================================
// Engine — view refresh loop and dashboard commands
// =============================================================================
//
// Every mutation of the shared state funnels through here: the periodic view
// refresh, scan start/stop, view switching, device selection, palette
// changes, log reset and CSV export. Handlers in api/ are thin wrappers
// around these functions.
//
// Refresh pipeline, once per tick:
//   1. Clone the runtime config and snapshot the sample log
//   2. Advance the tick counter and derive the re-rank flag
//   3. Rebuild the active view's derived state from the snapshot
//   4. Bump the state version so the WebSocket feed pushes
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::telemetry::{export, unix_now};
use crate::types::ViewKind;
use crate::views::{ActiveView, TickContext};

pub struct Engine;

impl Engine {
    /// Run one refresh tick against the active view.
    pub fn refresh_tick(state: &Arc<AppState>, now: f64) {
        let config = state.runtime_config.read().clone();
        let samples = state.sample_log.snapshot();

        let mut view = state.active_view.write();
        let kind = view.kind();
        let tick = state.view_tick.fetch_add(1, Ordering::Relaxed);
        let rerank = tick % config.timings.rerank_ticks(kind) == 0;

        view.refresh(&samples, &config, TickContext { now, tick, rerank });
        drop(view);

        state.increment_version();
    }

    /// Flip the scanning state and drive the adapter accordingly. Returns the
    /// new desired state.
    pub fn toggle_scanning(state: &Arc<AppState>) -> bool {
        let on = !state.scanning.load(Ordering::SeqCst);
        Self::set_scanning(state, on);
        on
    }

    /// Start or stop discovery. Adapter failures are logged and recorded but
    /// never propagate; the desired state is stored either way so the
    /// dashboard reflects what the operator asked for.
    pub fn set_scanning(state: &Arc<AppState>, on: bool) {
        let filter = state.runtime_config.read().scan_filter.clone();
        let result = if on {
            state.scan_control.start_scan(&filter)
        } else {
            state.scan_control.stop_scan()
        };

        if let Err(e) = result {
            warn!(scanning = on, error = %e, "adapter call failed");
            state.push_error_with_context(e.to_string(), Some("scan_control".to_string()));
        }

        state.scanning.store(on, Ordering::SeqCst);
        info!(scanning = on, "scanning state changed");
        state.increment_version();
    }

    /// Switch the active view. The old view's state is dropped entirely; the
    /// replacement is built fresh from the current log. Selecting the view
    /// that is already active is a no-op.
    pub fn select_view(state: &Arc<AppState>, kind: ViewKind) {
        if state.active_view.read().kind() == kind {
            return;
        }

        let config = state.runtime_config.read().clone();
        let samples = state.sample_log.snapshot();
        let now = unix_now();

        *state.active_view.write() = ActiveView::create(kind, &samples, &config, now);
        state.view_tick.store(0, Ordering::Relaxed);
        info!(view = %kind, "active view switched");
        state.increment_version();
    }

    /// Discard all samples, renew the session and rebuild the active view
    /// from the now-empty log.
    pub fn reset_data(state: &Arc<AppState>) {
        let discarded = state.sample_log.len();
        let now = unix_now();
        let session = state.sample_log.reset(now);

        let config = state.runtime_config.read().clone();
        let kind = state.active_view.read().kind();
        *state.active_view.write() = ActiveView::create(kind, &[], &config, now);
        state.view_tick.store(0, Ordering::Relaxed);

        info!(discarded, session = %session.id, "sample log reset");
        state.increment_version();
    }

    /// Export the log to CSV. With no explicit path the timestamped default
    /// is used. Failures are recorded in the error log and returned to the
    /// caller.
    pub fn save_data(state: &Arc<AppState>, path: Option<PathBuf>) -> Result<(PathBuf, usize)> {
        let path = path.unwrap_or_else(|| export::default_export_path(unix_now()));

        match state.sample_log.persist(&path) {
            Ok(rows) => {
                info!(path = %path.display(), rows, "sample log exported");
                Ok((path, rows))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sample log export failed");
                state.push_error_with_context(format!("{e:#}"), Some("save_data".to_string()));
                Err(e)
            }
        }
    }

    /// Point the series view at a device. Returns `false` when the series
    /// view is not active.
    pub fn select_device(state: &Arc<AppState>, device_id: &str) -> bool {
        let accepted = state.active_view.write().select_device(device_id);
        if accepted {
            info!(device = %device_id, "series device selected");
            // Fill in the new device immediately instead of waiting a tick.
            Self::refresh_tick(state, unix_now());
        }
        accepted
    }

    /// Change the waterfall palette. Returns `false` when the waterfall is
    /// not active or the name is unknown.
    pub fn set_palette(state: &Arc<AppState>, palette: &str) -> bool {
        let accepted = state.active_view.write().set_palette(palette);
        if accepted {
            info!(palette = %palette, "waterfall palette changed");
            state.increment_version();
        }
        accepted
    }
}

// ---------------------------------------------------------------------------
// Refresh loop
// ---------------------------------------------------------------------------

/// Drive the active view at its configured cadence until shutdown.
///
/// The period is re-read every iteration, so switching views (or editing the
/// config) takes effect on the next tick without restarting the loop.
pub async fn run_refresh_loop(state: Arc<AppState>) {
    info!("view refresh loop started");

    loop {
        let kind = state.active_view.read().kind();
        let period_ms = state.runtime_config.read().timings.period_ms(kind);
        tokio::time::sleep(Duration::from_millis(period_ms)).await;

        Engine::refresh_tick(&state, unix_now());
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::RuntimeConfig;
    use crate::scanner::{ScanControl, ScanError, ScanFilter};
    use crate::views::ViewSnapshot;

    struct StubControl;

    impl ScanControl for StubControl {
        fn start_scan(&self, _filter: &ScanFilter) -> Result<(), ScanError> {
            Ok(())
        }

        fn stop_scan(&self) -> Result<(), ScanError> {
            Ok(())
        }

        fn release_device(&self, _device_id: &str) -> Result<(), ScanError> {
            Ok(())
        }
    }

    struct FailingControl;

    impl ScanControl for FailingControl {
        fn start_scan(&self, _filter: &ScanFilter) -> Result<(), ScanError> {
            Err(ScanError::Adapter("radio unavailable".to_string()))
        }

        fn stop_scan(&self) -> Result<(), ScanError> {
            Err(ScanError::Adapter("discovery is not running".to_string()))
        }

        fn release_device(&self, _device_id: &str) -> Result<(), ScanError> {
            Ok(())
        }
    }

    fn make_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            RuntimeConfig::default(),
            Arc::new(StubControl),
            0.0,
        ))
    }

    #[test]
    fn toggle_flips_state_both_ways() {
        let state = make_state();
        assert!(Engine::toggle_scanning(&state));
        assert!(state.scanning.load(Ordering::SeqCst));
        assert!(!Engine::toggle_scanning(&state));
        assert!(!state.scanning.load(Ordering::SeqCst));
    }

    #[test]
    fn adapter_failure_is_recorded_but_state_still_changes() {
        let state = Arc::new(AppState::new(
            RuntimeConfig::default(),
            Arc::new(FailingControl),
            0.0,
        ));

        assert!(Engine::toggle_scanning(&state));
        assert!(state.scanning.load(Ordering::SeqCst));

        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("radio unavailable"));
        assert_eq!(errors[0].context.as_deref(), Some("scan_control"));
    }

    #[test]
    fn refresh_reranks_on_the_configured_stride() {
        let state = make_state();
        state.runtime_config.write().timings.aggregate_rerank_ticks = 2;

        state.sample_log.record("A", -50.0, unix_now());

        // Tick 0 re-ranks and picks up the device.
        Engine::refresh_tick(&state, unix_now());
        let scatter_len = |state: &Arc<AppState>| match state.build_snapshot().view {
            ViewSnapshot::Aggregate(snap) => snap.scatter.len(),
            _ => panic!("aggregate view expected"),
        };
        assert_eq!(scatter_len(&state), 1);

        // Tick 1 skips the re-rank, so the new device stays invisible.
        state.sample_log.record("B", -60.0, unix_now());
        Engine::refresh_tick(&state, unix_now());
        assert_eq!(scatter_len(&state), 1);

        // Tick 2 re-ranks again.
        Engine::refresh_tick(&state, unix_now());
        assert_eq!(scatter_len(&state), 2);
    }

    #[test]
    fn select_view_rebuilds_and_resets_tick() {
        let state = make_state();
        Engine::refresh_tick(&state, unix_now());
        Engine::refresh_tick(&state, unix_now());
        assert!(state.view_tick.load(Ordering::Relaxed) >= 2);

        Engine::select_view(&state, ViewKind::Series);
        assert_eq!(state.active_view.read().kind(), ViewKind::Series);
        assert_eq!(state.view_tick.load(Ordering::Relaxed), 0);

        // Re-selecting the active view is a no-op.
        let version = state.current_state_version();
        Engine::select_view(&state, ViewKind::Series);
        assert_eq!(state.current_state_version(), version);
    }

    #[test]
    fn reset_discards_samples_and_renews_session() {
        let state = make_state();
        state.sample_log.record("A", -50.0, 1.0);
        state.sample_log.record("B", -60.0, 2.0);
        let before = state.sample_log.session();

        Engine::reset_data(&state);

        assert_eq!(state.sample_log.len(), 0);
        assert_ne!(state.sample_log.session().id, before.id);
        let snap = state.build_snapshot();
        assert_eq!(snap.total_samples, 0);
    }

    #[test]
    fn save_writes_csv_and_reports_rows() {
        let state = make_state();
        state.sample_log.record("AA:BB:CC:DD:EE:FF", -50.0, 1000.0);
        state.sample_log.record("AA:BB:CC:DD:EE:FF", -52.0, 1001.0);

        let path = std::env::temp_dir().join(format!(
            "btscan_test_{}_engine_save.csv",
            std::process::id()
        ));
        let (written_path, rows) = Engine::save_data(&state, Some(path.clone())).unwrap();
        assert_eq!(written_path, path);
        assert_eq!(rows, 2);
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn failed_save_lands_in_the_error_log() {
        let state = make_state();
        let path = PathBuf::from("/nonexistent-btscan-dir/out.csv");

        assert!(Engine::save_data(&state, Some(path)).is_err());
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context.as_deref(), Some("save_data"));
    }

    #[test]
    fn device_selection_requires_the_series_view() {
        let state = make_state();
        assert!(!Engine::select_device(&state, "AA:BB"));

        Engine::select_view(&state, ViewKind::Series);
        assert!(Engine::select_device(&state, "AA:BB"));

        match state.build_snapshot().view {
            ViewSnapshot::Series(snap) => assert_eq!(snap.selected.as_deref(), Some("AA:BB")),
            _ => panic!("series view expected"),
        }
    }

    #[test]
    fn palette_change_requires_the_waterfall_view() {
        let state = make_state();
        assert!(!Engine::set_palette(&state, "jet"));

        Engine::select_view(&state, ViewKind::Waterfall);
        assert!(Engine::set_palette(&state, "jet"));
        assert!(!Engine::set_palette(&state, "not-a-palette"));

        match state.build_snapshot().view {
            ViewSnapshot::Waterfall(snap) => assert_eq!(snap.palette, "jet"),
            _ => panic!("waterfall view expected"),
        }
    }
}
