// =============================================================================
// BTScan Telemetry Engine — Main Entry Point
// =============================================================================
//
// Boots the simulated BLE adapter, starts discovery, and serves the dashboard
// API. Discovery can be paused and resumed from the dashboard at any time.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod engine;
mod runtime_config;
mod scanner;
mod telemetry;
mod types;
mod views;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::engine::Engine;
use crate::runtime_config::{RuntimeConfig, CONFIG_PATH};
use crate::scanner::{ScanControl, SimulatedAdapter};
use crate::telemetry::unix_now;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        BTScan Telemetry Engine — Starting Up            ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override the simulated fleet size from env if available.
    if let Ok(devices) = std::env::var("BTSCAN_SIM_DEVICES") {
        match devices.parse::<usize>() {
            Ok(n) if n > 0 => config.simulator.device_count = n,
            _ => warn!(value = %devices, "Ignoring invalid BTSCAN_SIM_DEVICES"),
        }
    }

    info!(
        devices = config.simulator.device_count,
        emit_interval_ms = config.simulator.emit_interval_ms,
        "Simulated adapter configured"
    );

    // ── 2. Build adapter & shared state ──────────────────────────────────
    let adapter = Arc::new(SimulatedAdapter::new(
        config.simulator.device_count,
        config.simulator.emit_interval_ms,
    ));
    let scan_control: Arc<dyn ScanControl> = adapter.clone();
    let state = Arc::new(AppState::new(config, scan_control, unix_now()));

    // ── 3. Start discovery ───────────────────────────────────────────────
    Engine::set_scanning(&state, true);

    // ── 4. Spawn the advertisement producer ──────────────────────────────
    let producer_adapter = adapter.clone();
    let producer_state = state.clone();
    tokio::spawn(async move {
        scanner::simulator::run_advertiser(producer_adapter, producer_state).await;
    });

    // ── 5. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("BTSCAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    // ── 6. View refresh loop ─────────────────────────────────────────────
    let refresh_state = state.clone();
    tokio::spawn(async move {
        engine::run_refresh_loop(refresh_state).await;
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if state.scanning.load(std::sync::atomic::Ordering::SeqCst) {
        Engine::set_scanning(&state, false);
    }

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("BTScan telemetry engine shut down complete.");
    Ok(())
}
