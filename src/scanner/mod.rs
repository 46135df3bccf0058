// =============================================================================
// Scanner Module
// =============================================================================
//
// The boundary between the aggregation core and whatever produces BLE
// advertisements. The core only talks to [`ScanControl`]; the bundled
// [`SimulatedAdapter`] stands in for real radio hardware and emits plausible
// advertisement traffic.

pub mod simulator;

pub use simulator::SimulatedAdapter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Scan filter
// =============================================================================

fn default_transport() -> String {
    "le".to_string()
}

fn default_rssi_floor() -> f64 {
    -120.0
}

fn default_allow_duplicates() -> bool {
    true
}

/// Discovery parameters handed to the adapter when scanning starts.
///
/// Duplicates stay enabled: repeat advertisements from the same device are
/// the signal being measured, not noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFilter {
    /// Transport to scan on; only low-energy advertising is of interest.
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Advertisements weaker than this are dropped at ingest, dBm.
    #[serde(default = "default_rssi_floor")]
    pub rssi_floor: f64,

    /// Keep reporting a device on every advertisement, not just the first.
    #[serde(default = "default_allow_duplicates")]
    pub allow_duplicates: bool,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            rssi_floor: default_rssi_floor(),
            allow_duplicates: default_allow_duplicates(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failures crossing the adapter boundary. Callers log these and keep the
/// pipeline running; they are never allowed to take down the app.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("unknown device {0}")]
    UnknownDevice(String),
}

// =============================================================================
// Control surface
// =============================================================================

/// What the engine needs from an adapter: start and stop discovery, and
/// release a device from the adapter's cache after an observation so repeat
/// advertisements keep flowing.
pub trait ScanControl: Send + Sync {
    fn start_scan(&self, filter: &ScanFilter) -> Result<(), ScanError>;

    /// Stopping a scan that is not running is an adapter error.
    fn stop_scan(&self) -> Result<(), ScanError>;

    fn release_device(&self, device_id: &str) -> Result<(), ScanError>;
}
