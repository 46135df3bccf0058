use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::telemetry::export;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One discovery observation. Immutable once constructed; the log only ever
/// stores fully-formed samples, so readers never see a partial tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Advertiser identity as reported by the adapter (MAC-style string).
    pub device_id: String,
    /// Received signal strength in dBm, typically -100..0.
    pub signal_strength: f64,
    /// Wall-clock time of the observation, seconds since the Unix epoch.
    pub observed_at: f64,
}

/// Identity of one logical scan session. A reset discards all samples and
/// renews the session, so consumers can detect the discontinuity.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: f64,
}

// ---------------------------------------------------------------------------
// SampleLog -- append-only store shared between producer and refresh loop
// ---------------------------------------------------------------------------

/// Append-only store of discovery samples, safe to append from the producer
/// task while the refresh loop reads.
///
/// `snapshot` clones the current contents under a brief read lock; the clone
/// stays stable for the whole consumer pass no matter how many appends land
/// concurrently. `reset` swaps in an empty log atomically -- a concurrent
/// append is either fully in the old log or fully in the new one.
pub struct SampleLog {
    samples: RwLock<Vec<Sample>>,
    session: RwLock<SessionInfo>,
    appended: AtomicU64,
}

impl SampleLog {
    pub fn new(now: f64) -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            session: RwLock::new(SessionInfo {
                id: Uuid::new_v4(),
                started_at: now,
            }),
            appended: AtomicU64::new(0),
        }
    }

    /// Append one fully-formed sample.
    pub fn append(&self, sample: Sample) {
        self.samples.write().push(sample);

        let n = self.appended.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 1000 == 0 {
            debug!(samples = n, "sample log milestone");
        }
    }

    /// Ingress for the discovery source: stamp the reading with `now` and
    /// append it.
    pub fn record(&self, device_id: &str, signal_strength: f64, now: f64) {
        self.append(Sample {
            device_id: device_id.to_string(),
            signal_strength,
            observed_at: now,
        });
    }

    /// Point-in-time copy of the log, oldest sample first (insertion order).
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.read().clone()
    }

    /// Discard all samples and start a new logical session. Snapshots taken
    /// before the reset keep the old contents.
    pub fn reset(&self, now: f64) -> SessionInfo {
        let session = SessionInfo {
            id: Uuid::new_v4(),
            started_at: now,
        };
        *self.samples.write() = Vec::new();
        *self.session.write() = session.clone();
        self.appended.store(0, Ordering::Relaxed);
        session
    }

    /// Serialise a snapshot of the log to `path` as CSV. Returns the number
    /// of data rows written; IO failures are surfaced to the caller.
    pub fn persist(&self, path: &Path) -> Result<usize> {
        let samples = self.snapshot();
        export::write_csv(&samples, path)
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Number of distinct devices seen over the entire log.
    pub fn device_count(&self) -> usize {
        let samples = self.samples.read();
        let mut seen = std::collections::HashSet::with_capacity(64);
        for s in samples.iter() {
            seen.insert(s.device_id.as_str());
        }
        seen.len()
    }

    pub fn session(&self) -> SessionInfo {
        self.session.read().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_sample(device_id: &str, signal_strength: f64, observed_at: f64) -> Sample {
        Sample {
            device_id: device_id.to_string(),
            signal_strength,
            observed_at,
        }
    }

    #[test]
    fn snapshot_is_isolated_from_later_appends() {
        let log = SampleLog::new(0.0);
        log.append(make_sample("AA:00", -50.0, 1.0));

        let snap = log.snapshot();
        log.append(make_sample("AA:01", -60.0, 2.0));
        log.append(make_sample("AA:02", -70.0, 3.0));

        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].device_id, "AA:00");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn reset_clears_samples_and_renews_session() {
        let log = SampleLog::new(0.0);
        log.append(make_sample("AA:00", -50.0, 1.0));
        log.append(make_sample("AA:01", -55.0, 2.0));

        let before = log.session();
        let snap = log.snapshot();
        let after = log.reset(10.0);

        assert_eq!(log.len(), 0);
        assert!(log.is_empty());
        assert_ne!(before.id, after.id);
        assert!((after.started_at - 10.0).abs() < f64::EPSILON);
        // The pre-reset snapshot is unaffected.
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn device_count_is_distinct_over_entire_log() {
        let log = SampleLog::new(0.0);
        log.append(make_sample("AA:00", -50.0, 1.0));
        log.append(make_sample("AA:00", -52.0, 2.0));
        log.append(make_sample("AA:01", -60.0, 3.0));

        assert_eq!(log.device_count(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn record_stamps_observed_at() {
        let log = SampleLog::new(0.0);
        log.record("AA:00", -42.0, 123.5);

        let snap = log.snapshot();
        assert_eq!(snap.len(), 1);
        assert!((snap[0].observed_at - 123.5).abs() < f64::EPSILON);
        assert!((snap[0].signal_strength + 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrent_appends_all_land() {
        let log = Arc::new(SampleLog::new(0.0));
        let mut handles = Vec::new();

        for t in 0..4 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    log.record(&format!("DE:{t:02X}"), -60.0, i as f64);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.len(), 1000);
        assert_eq!(log.device_count(), 4);
    }
}
