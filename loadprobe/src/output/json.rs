use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use loadprobe_core::{
    OutcomeFn, RequestOutcome, ShapeProgress, ShapeProgressFn, StatRecorder, ThresholdViolation,
};

use super::{ReportFormatter, RunHeader, RunReport, print_interrupted, print_violations};

pub(crate) struct JsonOutput {
    print_requests: bool,
}

impl JsonOutput {
    pub(crate) fn new(print_requests: bool) -> Self {
        Self { print_requests }
    }
}

impl ReportFormatter for JsonOutput {
    fn print_header(&self, _header: &RunHeader) {}

    fn observer(&self, _recorder: &Arc<StatRecorder>, _header: &RunHeader) -> Option<OutcomeFn> {
        if !self.print_requests {
            return None;
        }
        Some(Arc::new(|o: &RequestOutcome| {
            emit_json_line(&build_request_line(o));
        }))
    }

    fn shape_progress(&self, _header: &RunHeader) -> Option<ShapeProgressFn> {
        Some(Arc::new(|p: &ShapeProgress| {
            emit_json_line(&build_progress_line(p));
        }))
    }

    fn print_summary(&self, report: &RunReport<'_>) -> anyhow::Result<()> {
        emit_json_line(&build_summary_line(report));
        print_interrupted(report.driver);
        print_violations(report.violations);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRequestLine<'a> {
    pub kind: &'static str,
    pub id: u64,
    pub endpoint: &'a str,
    pub outcome: String,
    pub status: Option<u16>,
    pub latency_ms: f64,
}

fn build_request_line(o: &RequestOutcome) -> JsonRequestLine<'_> {
    JsonRequestLine {
        kind: "request",
        id: o.id,
        endpoint: &o.endpoint,
        outcome: o.outcome.kind().to_string(),
        status: o.outcome.status(),
        latency_ms: o.latency_ms,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub target_users: u64,
    pub active_users: u64,
    pub spawn_rate: f64,
    pub requests_total: u64,
    pub failed_total: u64,
    pub latency_p50: Option<f64>,
    pub latency_p95: Option<f64>,
}

fn build_progress_line(p: &ShapeProgress) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: p.tick,
        elapsed_secs: p.elapsed.as_secs_f64(),
        target_users: p.target,
        active_users: p.active,
        spawn_rate: p.spawn_rate,
        requests_total: p.live.total,
        failed_total: p.live.failed,
        latency_p50: p.live.p50_ms,
        latency_p95: p.live.p95_ms,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub base_url: String,
    pub interrupted: bool,
    pub elapsed_secs: f64,
    pub requests_total: u64,
    pub success_total: u64,
    pub failed_total: u64,
    pub requests_per_sec: Option<f64>,
    pub latency: Option<JsonLatencySummary>,
    pub status_codes: BTreeMap<String, JsonStatusCount>,
    pub endpoints: BTreeMap<String, JsonEndpointSummary>,
    pub threshold_violations: Vec<JsonViolation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonStatusCount {
    pub count: u64,
    pub pct: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonEndpointSummary {
    pub count: u64,
    pub success_count: u64,
    pub avg_latency_ms: Option<f64>,
    pub success_rate_pct: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonViolation {
    pub metric: String,
    pub limit: f64,
    pub observed: Option<f64>,
}

impl From<&ThresholdViolation> for JsonViolation {
    fn from(v: &ThresholdViolation) -> Self {
        Self {
            metric: v.metric.to_string(),
            limit: v.limit,
            observed: v.observed,
        }
    }
}

fn build_summary_line(report: &RunReport<'_>) -> JsonSummaryLine {
    let snap = &report.driver.snapshot;
    let secs = report.driver.elapsed.as_secs_f64();

    let latency = snap.latency_summary().map(|l| JsonLatencySummary {
        min: l.min,
        max: l.max,
        mean: l.mean,
        p50: l.p50,
        p95: l.p95,
        p99: l.p99,
        count: l.count,
    });

    let status_codes = snap
        .status_histogram
        .iter()
        .map(|(key, count)| {
            (
                key.to_string(),
                JsonStatusCount {
                    count: *count,
                    pct: snap.status_pct(*count),
                },
            )
        })
        .collect();

    let endpoints = snap
        .per_endpoint
        .iter()
        .map(|(path, s)| {
            (
                path.clone(),
                JsonEndpointSummary {
                    count: s.count,
                    success_count: s.success_count,
                    avg_latency_ms: s.avg_latency_ms(),
                    success_rate_pct: s.success_rate_pct(),
                },
            )
        })
        .collect();

    JsonSummaryLine {
        kind: "summary",
        base_url: report.header.base_url.clone(),
        interrupted: report.driver.interrupted,
        elapsed_secs: secs,
        requests_total: snap.total,
        success_total: snap.success,
        failed_total: snap.failed,
        requests_per_sec: (secs > 0.0).then(|| snap.total as f64 / secs),
        latency,
        status_codes,
        endpoints,
        threshold_violations: report.violations.iter().map(JsonViolation::from).collect(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
