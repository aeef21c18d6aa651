use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::outcome::{RequestOutcome, StatusKey};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EndpointStats {
    pub count: u64,
    pub success_count: u64,
    pub total_latency_ms: f64,
}

impl EndpointStats {
    /// `None` when the endpoint saw no requests.
    #[must_use]
    pub fn avg_latency_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_latency_ms / self.count as f64)
    }

    #[must_use]
    pub fn success_rate_pct(&self) -> Option<f64> {
        (self.count > 0).then(|| self.success_count as f64 / self.count as f64 * 100.0)
    }
}

/// Rank-estimated latency statistics, in milliseconds.
///
/// Percentiles use the nearest-rank rule on the ascending sort: with `n` samples,
/// `p50 = sorted[n / 2]`, `p95 = sorted[floor(n * 0.95)]` and `p99 = sorted[floor(n * 0.99)]`.
/// There is no interpolation; the index is clamped to `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencySummary {
    /// `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Some(Self {
            count: n as u64,
            min: sorted[0],
            max: sorted[n - 1],
            mean: sum / n as f64,
            p50: rank(&sorted, 0.5),
            p95: rank(&sorted, 0.95),
            p99: rank(&sorted, 0.99),
        })
    }
}

fn rank(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() as f64) * q).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Immutable copy of the recorder's aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// Completion order.
    pub latencies: Vec<f64>,
    pub status_histogram: BTreeMap<StatusKey, u64>,
    pub per_endpoint: BTreeMap<String, EndpointStats>,
}

impl StatSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    #[must_use]
    pub fn latency_summary(&self) -> Option<LatencySummary> {
        LatencySummary::from_samples(&self.latencies)
    }

    /// Failed / total, in `0..=1`.
    #[must_use]
    pub fn error_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.failed as f64 / self.total as f64)
    }

    /// Share of `total` for a histogram bucket, in percent.
    #[must_use]
    pub fn status_pct(&self, count: u64) -> Option<f64> {
        (self.total > 0).then(|| count as f64 / self.total as f64 * 100.0)
    }
}

/// Live counters for progress displays.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
}

#[derive(Debug)]
struct Aggregates {
    total: u64,
    success: u64,
    failed: u64,
    latencies: Vec<f64>,
    status_histogram: BTreeMap<StatusKey, u64>,
    per_endpoint: AHashMap<Arc<str>, EndpointStats>,
    latency_us: Histogram<u64>,
}

/// Accumulates request outcomes from any number of concurrent tasks.
///
/// Every aggregate is updated under a single lock, so a reader never observes a
/// half-applied outcome and `total == success + failed` always holds.
#[derive(Debug)]
pub struct StatRecorder {
    inner: Mutex<Aggregates>,
}

impl Default for StatRecorder {
    fn default() -> Self {
        // Track up to 10 minutes in microseconds (with 3 sigfigs).
        let latency_us = Histogram::<u64>::new_with_bounds(1, 600_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));

        Self {
            inner: Mutex::new(Aggregates {
                total: 0,
                success: 0,
                failed: 0,
                latencies: Vec::new(),
                status_histogram: BTreeMap::new(),
                per_endpoint: AHashMap::new(),
                latency_us,
            }),
        }
    }
}

impl StatRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        let success = outcome.outcome.is_success();
        let latency_ms = if outcome.latency_ms.is_finite() {
            outcome.latency_ms.max(0.0)
        } else {
            0.0
        };

        let mut inner = self.inner.lock();
        inner.total += 1;
        if success {
            inner.success += 1;
        } else {
            inner.failed += 1;
        }
        inner.latencies.push(latency_ms);
        *inner
            .status_histogram
            .entry(outcome.outcome.status_key())
            .or_insert(0) += 1;

        let ep = inner
            .per_endpoint
            .entry(outcome.endpoint.clone())
            .or_default();
        ep.count += 1;
        ep.total_latency_ms += latency_ms;
        if success {
            ep.success_count += 1;
        }

        inner
            .latency_us
            .saturating_record((latency_ms * 1000.0).round() as u64);
    }

    pub fn total(&self) -> u64 {
        self.inner.lock().total
    }

    pub fn live(&self) -> LiveStats {
        let inner = self.inner.lock();

        #[allow(clippy::len_zero)]
        let (p50_ms, p95_ms) = if inner.latency_us.len() == 0 {
            (None, None)
        } else {
            (
                Some(inner.latency_us.value_at_quantile(0.50) as f64 / 1000.0),
                Some(inner.latency_us.value_at_quantile(0.95) as f64 / 1000.0),
            )
        };

        LiveStats {
            total: inner.total,
            success: inner.success,
            failed: inner.failed,
            p50_ms,
            p95_ms,
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        let inner = self.inner.lock();
        StatSnapshot {
            total: inner.total,
            success: inner.success,
            failed: inner.failed,
            latencies: inner.latencies.clone(),
            status_histogram: inner.status_histogram.clone(),
            per_endpoint: inner
                .per_endpoint
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::SystemTime;

    use super::*;
    use crate::outcome::Outcome;

    fn outcome(id: u64, endpoint: &str, outcome: Outcome, latency_ms: f64) -> RequestOutcome {
        RequestOutcome {
            id,
            endpoint: Arc::from(endpoint),
            outcome,
            latency_ms,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn empty_recorder_has_no_latency_summary() {
        let rec = StatRecorder::new();
        let snap = rec.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.latency_summary(), None);
        assert_eq!(snap.error_rate(), None);
        assert_eq!(rec.live().p95_ms, None);
    }

    #[test]
    fn every_outcome_lands_in_one_bucket_of_each_aggregate() {
        let rec = StatRecorder::new();
        rec.record(&outcome(1, "/a", Outcome::Success { status: 200 }, 10.0));
        rec.record(&outcome(2, "/a", Outcome::HttpError(500), 20.0));
        rec.record(&outcome(3, "/b", Outcome::Timeout, 1000.0));
        rec.record(&outcome(
            4,
            "/b",
            Outcome::TransportError {
                kind: "request".to_string(),
                message: "refused".to_string(),
            },
            1.0,
        ));

        let snap = rec.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.success, 1);
        assert_eq!(snap.failed, 3);
        assert_eq!(snap.latencies, vec![10.0, 20.0, 1000.0, 1.0]);
        assert_eq!(snap.status_histogram.values().sum::<u64>(), 4);
        assert_eq!(snap.status_histogram.get(&StatusKey::Code(500)), Some(&1));
        assert_eq!(snap.status_histogram.get(&StatusKey::Timeout), Some(&1));
        assert_eq!(
            snap.per_endpoint.values().map(|e| e.count).sum::<u64>(),
            4
        );

        let a = snap.per_endpoint.get("/a").unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(a.success_count, 1);
        assert_eq!(a.avg_latency_ms(), Some(15.0));
        assert_eq!(a.success_rate_pct(), Some(50.0));
    }

    #[test]
    fn rank_percentiles_use_floor_index() {
        let samples: Vec<f64> = (1..=10u32).map(f64::from).collect();
        let s = LatencySummary::from_samples(&samples).unwrap();
        // n=10: p50 -> idx 5, p95 -> idx 9, p99 -> idx 9.
        assert_eq!(s.p50, 6.0);
        assert_eq!(s.p95, 10.0);
        assert_eq!(s.p99, 10.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 10.0);
        assert_eq!(s.mean, 5.5);

        let one = LatencySummary::from_samples(&[42.0]).unwrap();
        assert_eq!((one.p50, one.p95, one.p99), (42.0, 42.0, 42.0));

        let hundred: Vec<f64> = (0..100u32).map(f64::from).collect();
        let s = LatencySummary::from_samples(&hundred).unwrap();
        assert_eq!((s.p50, s.p95, s.p99), (50.0, 95.0, 99.0));
    }

    #[test]
    fn percentiles_ignore_arrival_order() {
        let forward: Vec<f64> = (0..257u32).map(|i| f64::from(i * 7 % 101)).collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut shuffled = forward.clone();
        fastrand::Rng::with_seed(3).shuffle(&mut shuffled);

        let a = LatencySummary::from_samples(&forward);
        assert_eq!(a, LatencySummary::from_samples(&reversed));
        assert_eq!(a, LatencySummary::from_samples(&shuffled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_not_lost() {
        let rec = Arc::new(StatRecorder::new());
        let mut tasks = Vec::new();
        for t in 0..16u64 {
            let rec = rec.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..250u64 {
                    let o = if i % 5 == 0 {
                        Outcome::HttpError(503)
                    } else {
                        Outcome::Success { status: 200 }
                    };
                    rec.record(&outcome(t * 1000 + i, "/x", o, 1.0));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let snap = rec.snapshot();
        assert_eq!(snap.total, 4000);
        assert_eq!(snap.success + snap.failed, 4000);
        assert_eq!(snap.failed, 800);
        assert_eq!(snap.latencies.len(), 4000);
        assert_eq!(snap.status_histogram.get(&StatusKey::Code(503)), Some(&800));
        assert_eq!(rec.live().total, 4000);
    }
}
