use std::fmt;

use strum::Display;

use crate::stats::StatSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMetric {
    P95,
    P99,
    ErrorRate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    pub metric: ThresholdMetric,
    pub limit: f64,
    /// `None` when the run produced no samples to judge.
    pub observed: Option<f64>,
}

impl fmt::Display for ThresholdViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.metric {
            ThresholdMetric::P95 | ThresholdMetric::P99 => "ms",
            ThresholdMetric::ErrorRate => "",
        };
        match self.observed {
            Some(v) => write!(
                f,
                "{}: observed {v:.2}{unit} exceeds limit {:.2}{unit}",
                self.metric, self.limit
            ),
            None => write!(f, "{}: no data (limit {:.2}{unit})", self.metric, self.limit),
        }
    }
}

/// Pass/fail gates evaluated against the final snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub max_p95_ms: Option<f64>,
    pub max_p99_ms: Option<f64>,
    /// Failed / total, in `0..=1`.
    pub max_error_rate: Option<f64>,
}

impl Thresholds {
    /// Empty when every configured gate holds. An empty snapshot fails every gate.
    pub fn evaluate(&self, snapshot: &StatSnapshot) -> Vec<ThresholdViolation> {
        let summary = snapshot.latency_summary();
        let checks = [
            (ThresholdMetric::P95, self.max_p95_ms, summary.map(|s| s.p95)),
            (ThresholdMetric::P99, self.max_p99_ms, summary.map(|s| s.p99)),
            (
                ThresholdMetric::ErrorRate,
                self.max_error_rate,
                snapshot.error_rate(),
            ),
        ];

        checks
            .into_iter()
            .filter_map(|(metric, limit, observed)| {
                let limit = limit?;
                match observed {
                    Some(v) if v <= limit => None,
                    _ => Some(ThresholdViolation {
                        metric,
                        limit,
                        observed,
                    }),
                }
            })
            .collect()
    }
}
