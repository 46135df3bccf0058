// =============================================================================
// Window Aggregation — pure sliding-window statistics over log snapshots
// =============================================================================
//
// Every function here is side-effect free: it takes a snapshot slice plus an
// explicit `now`, and returns derived rows. Empty windows and invalid cutoffs
// yield empty results, never errors — callers render "no data" instead of
// failing. A device with no in-window samples is absent from the output, not
// reported as zero.
// =============================================================================

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::telemetry::Sample;

// =============================================================================
// Derived row types
// =============================================================================

/// Per-device statistics over one time window. Rebuilt from the window on
/// every refresh, never mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRow {
    pub device_id: String,
    /// Arithmetic mean of in-window signal strengths, dBm.
    pub mean_signal_strength: f64,
    pub sample_count: usize,
    /// `sample_count / cutoff_secs`.
    pub rate_per_second: f64,
}

/// Log-wide statistics for the dashboard header.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    /// Distinct devices over the ENTIRE log, not just the window.
    pub distinct_devices: usize,
    /// Sample count over the ENTIRE log.
    pub total_samples: usize,
    /// Mean strength across all devices within the short window. `None` when
    /// the window is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_mean_strength: Option<f64>,
    /// Overall observation rate within the short window, samples per second.
    pub window_rate_per_second: f64,
    /// The cutoff this header was computed over, for display.
    pub window_secs: f64,
}

/// One point of a single-device time series: x is the offset from `now`
/// (always <= 0 for in-window samples), y is the strength.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub offset_secs: f64,
    pub signal_strength: f64,
}

// =============================================================================
// Window predicate
// =============================================================================

#[inline]
fn in_window(sample: &Sample, now: f64, cutoff_secs: f64) -> bool {
    now - sample.observed_at <= cutoff_secs
}

// =============================================================================
// Per-device aggregation
// =============================================================================

/// Group the in-window samples by device and compute mean / count / rate per
/// device. Returns rows ordered by device id so output is deterministic.
///
/// `cutoff_secs <= 0` yields an empty result (rate would divide by it).
pub fn device_aggregates(samples: &[Sample], now: f64, cutoff_secs: f64) -> Vec<AggregateRow> {
    if cutoff_secs <= 0.0 {
        return Vec::new();
    }

    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for s in samples {
        if in_window(s, now, cutoff_secs) {
            let entry = acc.entry(s.device_id.as_str()).or_insert((0.0, 0));
            entry.0 += s.signal_strength;
            entry.1 += 1;
        }
    }

    let mut rows: Vec<AggregateRow> = acc
        .into_iter()
        .map(|(device_id, (sum, count))| AggregateRow {
            device_id: device_id.to_string(),
            mean_signal_strength: sum / count as f64,
            sample_count: count,
            rate_per_second: count as f64 / cutoff_secs,
        })
        .collect();

    rows.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    rows
}

/// Aggregate a single device over the window. `None` when the device has no
/// in-window samples — absence, not an error.
pub fn device_aggregate(
    samples: &[Sample],
    device_id: &str,
    now: f64,
    cutoff_secs: f64,
) -> Option<AggregateRow> {
    if cutoff_secs <= 0.0 {
        return None;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for s in samples {
        if s.device_id == device_id && in_window(s, now, cutoff_secs) {
            sum += s.signal_strength;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }

    Some(AggregateRow {
        device_id: device_id.to_string(),
        mean_signal_strength: sum / count as f64,
        sample_count: count,
        rate_per_second: count as f64 / cutoff_secs,
    })
}

// =============================================================================
// Ranking
// =============================================================================

/// Keep the `limit` strongest devices, in ascending mean-strength order
/// (weakest of the keepers first — the order the ranking chart draws in).
pub fn top_by_strength(mut rows: Vec<AggregateRow>, limit: usize) -> Vec<AggregateRow> {
    rows.sort_by(|a, b| {
        a.mean_signal_strength
            .partial_cmp(&b.mean_signal_strength)
            .unwrap_or(Ordering::Equal)
    });
    let cut = rows.len().saturating_sub(limit);
    rows.split_off(cut)
}

/// Keep the `limit` busiest devices, in descending rate order.
pub fn top_by_rate(mut rows: Vec<AggregateRow>, limit: usize) -> Vec<AggregateRow> {
    rows.sort_by(|a, b| {
        b.rate_per_second
            .partial_cmp(&a.rate_per_second)
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(limit);
    rows
}

// =============================================================================
// Global statistics
// =============================================================================

/// Header statistics: whole-log device and sample totals plus mean strength
/// and overall rate over the short window.
pub fn global_stats(samples: &[Sample], now: f64, window_secs: f64) -> GlobalStats {
    let mut devices: HashSet<&str> = HashSet::new();
    let mut window_sum = 0.0;
    let mut window_count = 0usize;

    for s in samples {
        devices.insert(s.device_id.as_str());
        if window_secs > 0.0 && in_window(s, now, window_secs) {
            window_sum += s.signal_strength;
            window_count += 1;
        }
    }

    GlobalStats {
        distinct_devices: devices.len(),
        total_samples: samples.len(),
        window_mean_strength: if window_count > 0 {
            Some(window_sum / window_count as f64)
        } else {
            None
        },
        window_rate_per_second: if window_secs > 0.0 {
            window_count as f64 / window_secs
        } else {
            0.0
        },
        window_secs,
    }
}

/// The device with the highest mean strength across the whole log. Ties break
/// on device id so the result is deterministic. `None` on an empty log.
pub fn strongest_device(samples: &[Sample]) -> Option<String> {
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for s in samples {
        let entry = acc.entry(s.device_id.as_str()).or_insert((0.0, 0));
        entry.0 += s.signal_strength;
        entry.1 += 1;
    }

    let mut best: Option<(&str, f64)> = None;
    for (device_id, (sum, count)) in acc {
        let mean = sum / count as f64;
        best = match best {
            None => Some((device_id, mean)),
            Some((best_id, best_mean)) => {
                if mean > best_mean || (mean == best_mean && device_id < best_id) {
                    Some((device_id, mean))
                } else {
                    Some((best_id, best_mean))
                }
            }
        };
    }

    best.map(|(device_id, _)| device_id.to_string())
}

// =============================================================================
// Series extraction
// =============================================================================

/// The in-window samples of one device as (offset-from-now, strength) points,
/// in log order. A device absent from the window yields an empty series.
pub fn device_series(
    samples: &[Sample],
    device_id: &str,
    now: f64,
    cutoff_secs: f64,
) -> Vec<SeriesPoint> {
    if cutoff_secs <= 0.0 {
        return Vec::new();
    }

    samples
        .iter()
        .filter(|s| s.device_id == device_id && in_window(s, now, cutoff_secs))
        .map(|s| SeriesPoint {
            offset_secs: s.observed_at - now,
            signal_strength: s.signal_strength,
        })
        .collect()
}

// =============================================================================
// Incremental window (waterfall)
// =============================================================================

/// Mean strength per device over the half-open interval `(last_cutoff, now]`.
///
/// Consecutive calls with `last_cutoff` advanced to the previous `now` tile
/// time contiguously, so every sample is counted in exactly one interval.
pub fn incremental_means(samples: &[Sample], last_cutoff: f64, now: f64) -> HashMap<String, f64> {
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for s in samples {
        if s.observed_at > last_cutoff && s.observed_at <= now {
            let entry = acc.entry(s.device_id.as_str()).or_insert((0.0, 0));
            entry.0 += s.signal_strength;
            entry.1 += 1;
        }
    }

    acc.into_iter()
        .map(|(device_id, (sum, count))| (device_id.to_string(), sum / count as f64))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sample(device_id: &str, signal_strength: f64, observed_at: f64) -> Sample {
        Sample {
            device_id: device_id.to_string(),
            signal_strength,
            observed_at,
        }
    }

    fn row<'a>(rows: &'a [AggregateRow], device_id: &str) -> &'a AggregateRow {
        rows.iter()
            .find(|r| r.device_id == device_id)
            .unwrap_or_else(|| panic!("no row for {device_id}"))
    }

    #[test]
    fn two_device_window_means_counts_and_rates() {
        let t0 = 1000.0;
        let samples = vec![
            make_sample("A", -50.0, t0),
            make_sample("B", -70.0, t0 + 1.0),
            make_sample("A", -60.0, t0 + 2.0),
        ];

        let rows = device_aggregates(&samples, t0 + 2.0, 5.0);
        assert_eq!(rows.len(), 2);

        let a = row(&rows, "A");
        assert!((a.mean_signal_strength - (-55.0)).abs() < 1e-10);
        assert_eq!(a.sample_count, 2);
        assert!((a.rate_per_second - 0.4).abs() < 1e-10);

        let b = row(&rows, "B");
        assert!((b.mean_signal_strength - (-70.0)).abs() < 1e-10);
        assert_eq!(b.sample_count, 1);
        assert!((b.rate_per_second - 0.2).abs() < 1e-10);
    }

    #[test]
    fn empty_log_yields_empty_aggregate() {
        let rows = device_aggregates(&[], 100.0, 5.0);
        assert!(rows.is_empty());
    }

    #[test]
    fn non_positive_cutoff_yields_empty_aggregate() {
        let samples = vec![make_sample("A", -50.0, 10.0)];
        assert!(device_aggregates(&samples, 10.0, 0.0).is_empty());
        assert!(device_aggregates(&samples, 10.0, -3.0).is_empty());
    }

    #[test]
    fn stale_devices_are_excluded_not_zeroed() {
        let samples = vec![
            make_sample("FRESH", -50.0, 100.0),
            make_sample("STALE", -40.0, 10.0),
        ];

        let rows = device_aggregates(&samples, 100.0, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_id, "FRESH");
    }

    #[test]
    fn window_boundary_is_inclusive() {
        // age == cutoff is still in-window.
        let samples = vec![make_sample("A", -50.0, 95.0)];
        let rows = device_aggregates(&samples, 100.0, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample_count, 1);
    }

    #[test]
    fn rate_grows_with_sample_count_for_fixed_cutoff() {
        let few = vec![make_sample("A", -50.0, 99.0)];
        let many = vec![
            make_sample("A", -50.0, 98.0),
            make_sample("A", -52.0, 99.0),
            make_sample("A", -54.0, 100.0),
        ];

        let r_few = device_aggregates(&few, 100.0, 5.0)[0].rate_per_second;
        let r_many = device_aggregates(&many, 100.0, 5.0)[0].rate_per_second;
        assert!(r_many > r_few);
    }

    #[test]
    fn device_aggregate_single_device() {
        let samples = vec![
            make_sample("A", -50.0, 99.0),
            make_sample("B", -80.0, 99.5),
            make_sample("A", -54.0, 100.0),
        ];

        let a = device_aggregate(&samples, "A", 100.0, 5.0).unwrap();
        assert!((a.mean_signal_strength - (-52.0)).abs() < 1e-10);
        assert_eq!(a.sample_count, 2);

        assert!(device_aggregate(&samples, "MISSING", 100.0, 5.0).is_none());
    }

    #[test]
    fn top_by_strength_keeps_strongest_in_ascending_order() {
        let rows = vec![
            AggregateRow {
                device_id: "WEAK".into(),
                mean_signal_strength: -90.0,
                sample_count: 1,
                rate_per_second: 0.1,
            },
            AggregateRow {
                device_id: "MID".into(),
                mean_signal_strength: -70.0,
                sample_count: 1,
                rate_per_second: 0.1,
            },
            AggregateRow {
                device_id: "STRONG".into(),
                mean_signal_strength: -50.0,
                sample_count: 1,
                rate_per_second: 0.1,
            },
        ];

        let top = top_by_strength(rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].device_id, "MID");
        assert_eq!(top[1].device_id, "STRONG");
    }

    #[test]
    fn top_by_rate_descends_and_truncates() {
        let rows = vec![
            AggregateRow {
                device_id: "SLOW".into(),
                mean_signal_strength: -60.0,
                sample_count: 1,
                rate_per_second: 0.2,
            },
            AggregateRow {
                device_id: "FAST".into(),
                mean_signal_strength: -60.0,
                sample_count: 10,
                rate_per_second: 2.0,
            },
            AggregateRow {
                device_id: "MID".into(),
                mean_signal_strength: -60.0,
                sample_count: 5,
                rate_per_second: 1.0,
            },
        ];

        let top = top_by_rate(rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].device_id, "FAST");
        assert_eq!(top[1].device_id, "MID");
    }

    #[test]
    fn global_stats_totals_cover_entire_log() {
        // Both samples are far outside the window but still count in the
        // whole-log totals.
        let samples = vec![
            make_sample("A", -50.0, 10.0),
            make_sample("B", -70.0, 11.0),
        ];

        let stats = global_stats(&samples, 1000.0, 5.0);
        assert_eq!(stats.distinct_devices, 2);
        assert_eq!(stats.total_samples, 2);
        assert!(stats.window_mean_strength.is_none());
        assert!((stats.window_rate_per_second - 0.0).abs() < 1e-10);
    }

    #[test]
    fn global_stats_window_mean_and_rate() {
        let samples = vec![
            make_sample("A", -50.0, 99.0),
            make_sample("B", -70.0, 100.0),
            make_sample("C", -90.0, 10.0), // outside the window
        ];

        let stats = global_stats(&samples, 100.0, 5.0);
        assert_eq!(stats.distinct_devices, 3);
        assert_eq!(stats.total_samples, 3);
        assert!((stats.window_mean_strength.unwrap() - (-60.0)).abs() < 1e-10);
        assert!((stats.window_rate_per_second - 0.4).abs() < 1e-10);
    }

    #[test]
    fn strongest_device_uses_whole_log_mean() {
        let samples = vec![
            make_sample("A", -80.0, 1.0),
            make_sample("A", -80.0, 2.0),
            make_sample("B", -50.0, 3.0),
            make_sample("B", -90.0, 4.0), // mean -70, beats A's -80
        ];

        assert_eq!(strongest_device(&samples).unwrap(), "B");
        assert!(strongest_device(&[]).is_none());
    }

    #[test]
    fn strongest_device_tie_breaks_on_id() {
        let samples = vec![
            make_sample("BB", -60.0, 1.0),
            make_sample("AA", -60.0, 2.0),
        ];
        assert_eq!(strongest_device(&samples).unwrap(), "AA");
    }

    #[test]
    fn device_series_offsets_and_filtering() {
        let samples = vec![
            make_sample("A", -50.0, 95.0),
            make_sample("B", -70.0, 96.0),
            make_sample("A", -55.0, 100.0),
            make_sample("A", -60.0, 1.0), // outside the window
        ];

        let series = device_series(&samples, "A", 100.0, 10.0);
        assert_eq!(series.len(), 2);
        assert!((series[0].offset_secs - (-5.0)).abs() < 1e-10);
        assert!((series[1].offset_secs - 0.0).abs() < 1e-10);
        assert!(series.iter().all(|p| p.offset_secs <= 0.0));

        assert!(device_series(&samples, "MISSING", 100.0, 10.0).is_empty());
    }

    #[test]
    fn incremental_means_excludes_low_bound_includes_high() {
        let samples = vec![
            make_sample("A", -40.0, 10.0), // exactly at last_cutoff: excluded
            make_sample("A", -50.0, 11.0),
            make_sample("A", -60.0, 12.0), // exactly at now: included
            make_sample("A", -90.0, 12.5), // after now: excluded
        ];

        let means = incremental_means(&samples, 10.0, 12.0);
        assert_eq!(means.len(), 1);
        assert!((means["A"] - (-55.0)).abs() < 1e-10);
    }

    #[test]
    fn incremental_means_groups_per_device() {
        let samples = vec![
            make_sample("A", -50.0, 11.0),
            make_sample("B", -70.0, 11.5),
            make_sample("B", -80.0, 12.0),
        ];

        let means = incremental_means(&samples, 10.0, 12.0);
        assert_eq!(means.len(), 2);
        assert!((means["A"] - (-50.0)).abs() < 1e-10);
        assert!((means["B"] - (-75.0)).abs() < 1e-10);
    }
}
