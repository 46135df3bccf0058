// =============================================================================
// Central Application State — BTScan Telemetry Engine
// =============================================================================
//
// The single source of truth for the engine. The advertisement producer, the
// view refresh loop and the API surface all hold `Arc<AppState>`; this module
// ties the shared pieces together and provides a unified snapshot for the
// dashboard API and WebSocket feed.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - Arc wrappers for subsystems that manage their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::runtime_config::RuntimeConfig;
use crate::scanner::ScanControl;
use crate::telemetry::{unix_now, SampleLog, SessionInfo};
use crate::types::ViewKind;
use crate::views::{ActiveView, ViewSnapshot};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Operation that failed (e.g. "save_data").
    pub context: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Monotonically increasing version counter. Incremented on every
    /// meaningful state mutation. The WebSocket feed uses this to detect
    /// changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    /// Number of currently connected WebSocket clients.
    pub ws_clients: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Telemetry ───────────────────────────────────────────────────────
    pub sample_log: Arc<SampleLog>,

    // ── Active view ─────────────────────────────────────────────────────
    pub active_view: RwLock<ActiveView>,
    /// Refresh ticks since the active view was created; drives the re-rank
    /// stride. Reset to zero whenever the view is replaced.
    pub view_tick: AtomicU64,

    // ── Scanning ────────────────────────────────────────────────────────
    /// Desired scanning state as toggled from the dashboard.
    pub scanning: AtomicBool,
    pub scan_control: Arc<dyn ScanControl>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    /// Instant when the engine was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration and
    /// adapter handle. The returned value is typically wrapped in `Arc`
    /// immediately.
    pub fn new(config: RuntimeConfig, scan_control: Arc<dyn ScanControl>, now: f64) -> Self {
        let active_view = ActiveView::create(ViewKind::default(), &[], &config, now);

        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            ws_clients: AtomicU64::new(0),

            runtime_config: Arc::new(RwLock::new(config)),
            sample_log: Arc::new(SampleLog::new(now)),

            active_view: RwLock::new(active_view),
            view_tick: AtomicU64::new(0),

            scanning: AtomicBool::new(false),
            scan_control,

            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call this after every
    /// meaningful mutation to signal WebSocket clients that fresh data is
    /// available.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Ingest ──────────────────────────────────────────────────────────

    /// Entry point for the advertisement producer. Enforces the configured
    /// RSSI floor, stamps the observation and appends it to the log.
    pub fn on_device_observed(&self, device_id: &str, signal_strength: f64) {
        let floor = self.runtime_config.read().scan_filter.rssi_floor;
        if signal_strength < floor {
            debug!(
                device = %device_id,
                rssi = signal_strength,
                floor = floor,
                "advertisement below RSSI floor, dropped"
            );
            return;
        }

        self.sample_log.record(device_id, signal_strength, unix_now());
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when the limit is
    /// reached.
    pub fn push_error(&self, msg: String) {
        self.push_error_with_context(msg, None);
    }

    /// Record an error with the operation that produced it.
    pub fn push_error_with_context(&self, msg: String, context: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            context,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build a complete, serialisable snapshot of the engine state.
    ///
    /// This is the payload sent to the dashboard via the REST
    /// `GET /api/v1/state` endpoint and the WebSocket push feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let config = self.runtime_config.read().clone();
        let version = self.current_state_version();

        let view = self.active_view.read();
        let active_view = view.kind();
        let rendered = view.render();
        drop(view);

        let recent_errors = {
            let errors = self.recent_errors.read();
            if errors.is_empty() {
                None
            } else {
                Some(errors.clone())
            }
        };

        StateSnapshot {
            state_version: version,
            server_time: now.timestamp_millis(),
            scanning: self.scanning.load(Ordering::SeqCst),
            session: self.sample_log.session(),
            total_samples: self.sample_log.len(),
            distinct_devices: self.sample_log.device_count(),
            active_view,
            view: rendered,
            uptime_secs: self.start_time.elapsed().as_secs(),
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
            ws_sequence_number: self.ws_sequence_number.load(Ordering::Relaxed),
            recent_errors,
            config,
        }
    }
}

// =============================================================================
// Serialisable snapshot types (match the dashboard StateSnapshot interface)
// =============================================================================

/// Full engine state snapshot sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub scanning: bool,
    pub session: SessionInfo,
    pub total_samples: usize,
    pub distinct_devices: usize,
    pub active_view: ViewKind,
    pub view: ViewSnapshot,
    pub uptime_secs: u64,
    pub ws_clients: u64,
    pub ws_sequence_number: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_errors: Option<Vec<ErrorRecord>>,

    pub config: RuntimeConfig,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{ScanError, ScanFilter};

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

    fn make_state() -> AppState {
        AppState::new(RuntimeConfig::default(), Arc::new(StubControl), 0.0)
    }

    #[test]
    fn version_increments_monotonically() {
        let state = make_state();
        let v1 = state.current_state_version();
        state.increment_version();
        state.increment_version();
        assert_eq!(state.current_state_version(), v1 + 2);
    }

    #[test]
    fn ingest_enforces_rssi_floor() {
        let state = make_state();
        state.runtime_config.write().scan_filter.rssi_floor = -60.0;

        state.on_device_observed("AA:BB:CC:DD:EE:FF", -70.0);
        assert_eq!(state.sample_log.len(), 0);

        state.on_device_observed("AA:BB:CC:DD:EE:FF", -50.0);
        assert_eq!(state.sample_log.len(), 1);
    }

    #[test]
    fn error_ring_caps_and_evicts_oldest() {
        let state = make_state();
        for i in 0..60 {
            state.push_error(format!("error {i}"));
        }

        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 50);
        assert_eq!(errors[0].message, "error 10");
        assert_eq!(errors[49].message, "error 59");
    }

    #[test]
    fn snapshot_reflects_log_and_view() {
        let state = make_state();
        state.on_device_observed("AA:00:00:00:00:01", -50.0);
        state.on_device_observed("AA:00:00:00:00:01", -52.0);
        state.on_device_observed("AA:00:00:00:00:02", -70.0);

        let snap = state.build_snapshot();
        assert_eq!(snap.total_samples, 3);
        assert_eq!(snap.distinct_devices, 2);
        assert_eq!(snap.active_view, ViewKind::Aggregate);
        assert!(!snap.scanning);
        assert!(snap.recent_errors.is_none());

        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains(r#""active_view":"aggregate""#));
        assert!(json.contains(r#""kind":"aggregate""#));
    }

    #[test]
    fn snapshot_includes_errors_once_present() {
        let state = make_state();
        state.push_error("adapter fell over".to_string());

        let snap = state.build_snapshot();
        let errors = snap.recent_errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "adapter fell over");
    }
}
