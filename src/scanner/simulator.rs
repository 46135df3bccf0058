// =============================================================================
// Simulated Adapter — synthetic BLE advertisement traffic
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::scanner::{ScanControl, ScanError, ScanFilter};

/// One virtual advertiser: a fixed MAC with a characteristic strength that
/// per-advertisement noise wobbles around.
struct SimDevice {
    mac: String,
    base_dbm: f64,
}

/// Drop-in stand-in for radio hardware. Honours start/stop like a real
/// adapter would; the advertisement traffic itself comes from
/// [`run_advertiser`].
pub struct SimulatedAdapter {
    running: AtomicBool,
    devices: Vec<SimDevice>,
    emit_interval_ms: u64,
}

impl SimulatedAdapter {
    pub fn new(device_count: usize, emit_interval_ms: u64) -> Self {
        let mut rng = rand::thread_rng();
        let devices = (0..device_count)
            .map(|_| SimDevice {
                mac: random_mac(&mut rng),
                base_dbm: rng.gen_range(-92.0..-38.0),
            })
            .collect();

        Self {
            running: AtomicBool::new(false),
            devices,
            emit_interval_ms: emit_interval_ms.max(1),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl ScanControl for SimulatedAdapter {
    fn start_scan(&self, filter: &ScanFilter) -> Result<(), ScanError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("discovery already running");
            return Ok(());
        }
        info!(
            transport = %filter.transport,
            rssi_floor = filter.rssi_floor,
            duplicates = filter.allow_duplicates,
            devices = self.devices.len(),
            "discovery started"
        );
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), ScanError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ScanError::Adapter("discovery is not running".to_string()));
        }
        info!("discovery stopped");
        Ok(())
    }

    fn release_device(&self, device_id: &str) -> Result<(), ScanError> {
        if self.devices.iter().any(|d| d.mac == device_id) {
            Ok(())
        } else {
            Err(ScanError::UnknownDevice(device_id.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Advertiser loop
// ---------------------------------------------------------------------------

/// Emit advertisements into the app state for as long as the process lives.
///
/// Each iteration picks one device, jitters its base strength and reports it
/// through the normal ingest path, then releases the device from the adapter
/// cache so its next advertisement is seen again. While discovery is stopped
/// the loop idles without emitting.
pub async fn run_advertiser(adapter: Arc<SimulatedAdapter>, state: Arc<AppState>) {
    let mut rng = StdRng::from_entropy();
    info!(
        devices = adapter.devices.len(),
        interval_ms = adapter.emit_interval_ms,
        "advertiser loop started"
    );

    loop {
        if adapter.running.load(Ordering::SeqCst) {
            if let Some(device) = adapter.devices.choose(&mut rng) {
                let rssi = (device.base_dbm + rng.gen_range(-9.0..9.0)).clamp(-110.0, -25.0);
                state.on_device_observed(&device.mac, rssi);

                if let Err(e) = adapter.release_device(&device.mac) {
                    debug!(device = %device.mac, error = %e, "device release failed");
                }
            }
        }

        // Jitter the cadence so devices do not advertise in lockstep.
        let jitter = rng.gen_range(0.5..1.5);
        let sleep_ms = (adapter.emit_interval_ms as f64 * jitter).max(1.0) as u64;
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
    }
}

/// Random locally-administered unicast MAC, uppercase hex with colons.
fn random_mac(rng: &mut impl Rng) -> String {
    let mut b: [u8; 6] = rng.gen();
    b[0] = (b[0] | 0x02) & 0xFE;
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}
