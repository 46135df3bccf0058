// =============================================================================
// CSV Export — write the sample log to disk for offline analysis
// =============================================================================

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::telemetry::Sample;

/// Column header expected by the downstream analysis notebooks.
pub const CSV_HEADER: &str = "MACID,RSSI,Time";

/// Default export location: `BTScan_log_<unix-seconds>.csv` in the working
/// directory.
pub fn default_export_path(now: f64) -> PathBuf {
    PathBuf::from(format!("BTScan_log_{}.csv", now as i64))
}

/// Write the samples as UTF-8 CSV: one header line, then one row per sample
/// in log order. Returns the number of rows written (header excluded).
pub fn write_csv(samples: &[Sample], path: &Path) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{CSV_HEADER}").context("failed to write CSV header")?;
    for s in samples {
        writeln!(writer, "{},{},{}", s.device_id, s.signal_strength, s.observed_at)
            .context("failed to write CSV row")?;
    }
    writer.flush().context("failed to flush CSV export")?;

    Ok(samples.len())
}
