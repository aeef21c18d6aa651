use std::fmt::Write as _;

use crate::output::{PlanHeader, RunHeader, RunReport};

use super::format::*;

pub(crate) fn render_header(header: &RunHeader) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "target: {} timeout={} endpoints={}",
        header.base_url,
        format_duration(header.timeout),
        header.endpoints
    )
    .ok();

    match &header.plan {
        PlanHeader::Fixed {
            concurrency,
            requests,
            duration,
        } => {
            write!(&mut out, "plan: concurrency={concurrency}").ok();
            if let Some(n) = requests {
                write!(&mut out, " requests={n}").ok();
            }
            if let Some(d) = duration {
                write!(&mut out, " duration={}", format_duration(*d)).ok();
            }
            out.push('\n');
        }
        PlanHeader::Shaped { shape, tick, total } => {
            write!(&mut out, "plan: shape={shape} tick={}", format_duration(*tick)).ok();
            if let Some(d) = total {
                write!(&mut out, " length={}", format_duration(*d)).ok();
            }
            out.push('\n');
        }
    }

    out.push('\n');
    out
}

/// Never fails: missing data renders as `no data`.
pub(crate) fn render(report: &RunReport<'_>) -> String {
    let snap = &report.driver.snapshot;
    let wall = report.driver.elapsed;
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  requests: {} (success {}, failed {})",
        snap.total, snap.success, snap.failed
    )
    .ok();
    writeln!(&mut out, "  duration: {}", format_duration(wall)).ok();

    let secs = wall.as_secs_f64();
    if secs > 0.0 {
        writeln!(
            &mut out,
            "  rps: {}",
            format_rate(snap.total as f64 / secs)
        )
        .ok();
    } else {
        out.push_str("  rps: no data\n");
    }

    match snap.latency_summary() {
        Some(l) => {
            out.push_str("latency\n");
            writeln!(
                &mut out,
                "  min={} max={} avg={} median={} p95={} p99={} (n={})",
                format_ms(l.min),
                format_ms(l.max),
                format_ms(l.mean),
                format_ms(l.p50),
                format_ms(l.p95),
                format_ms(l.p99),
                l.count
            )
            .ok();
        }
        None => out.push_str("latency: no data\n"),
    }

    if snap.status_histogram.is_empty() {
        out.push_str("status codes: no data\n");
    } else {
        out.push_str("status codes\n");
        for (key, count) in &snap.status_histogram {
            writeln!(
                &mut out,
                "  {key}: {count} ({})",
                format_pct(snap.status_pct(*count))
            )
            .ok();
        }
    }

    if snap.per_endpoint.is_empty() {
        out.push_str("endpoints: no data\n");
    } else {
        out.push_str("endpoints\n");
        for (path, stats) in &snap.per_endpoint {
            writeln!(
                &mut out,
                "  {path}: count={} avg={} success={}",
                stats.count,
                format_ms_opt(stats.avg_latency_ms()),
                format_pct(stats.success_rate_pct())
            )
            .ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadprobe_core::{DriverReport, EndpointStats, StatSnapshot, StatusKey};
    use std::time::Duration;

    fn header() -> RunHeader {
        RunHeader {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
            endpoints: 6,
            plan: PlanHeader::Fixed {
                concurrency: 20,
                requests: Some(500),
                duration: None,
            },
        }
    }

    #[test]
    fn empty_run_renders_no_data_markers() {
        let header = header();
        let driver = DriverReport {
            snapshot: StatSnapshot::default(),
            elapsed: Duration::ZERO,
            interrupted: false,
        };
        let out = render(&RunReport {
            header: &header,
            driver: &driver,
            violations: &[],
        });

        assert!(out.contains("requests: 0 (success 0, failed 0)"));
        assert!(out.contains("rps: no data"));
        assert!(out.contains("latency: no data"));
        assert!(out.contains("status codes: no data"));
        assert!(out.contains("endpoints: no data"));
    }

    #[test]
    fn summary_lists_percentiles_statuses_and_endpoints() {
        let mut snapshot = StatSnapshot {
            total: 4,
            success: 3,
            failed: 1,
            latencies: vec![40.0, 10.0, 30.0, 20.0],
            ..StatSnapshot::default()
        };
        snapshot.status_histogram.insert(StatusKey::Code(200), 3);
        snapshot.status_histogram.insert(StatusKey::Timeout, 1);
        snapshot.per_endpoint.insert(
            "/test/simple".to_string(),
            EndpointStats {
                count: 4,
                success_count: 3,
                total_latency_ms: 100.0,
            },
        );

        let header = header();
        let driver = DriverReport {
            snapshot,
            elapsed: Duration::from_secs(2),
            interrupted: false,
        };
        let out = render(&RunReport {
            header: &header,
            driver: &driver,
            violations: &[],
        });

        assert!(out.contains("rps: 2.00"), "{out}");
        assert!(out.contains("min=10.00ms max=40.00ms avg=25.00ms median=30.00ms p95=40.00ms p99=40.00ms (n=4)"), "{out}");
        assert!(out.contains("200: 3 (75.0%)"), "{out}");
        assert!(out.contains("timeout: 1 (25.0%)"), "{out}");
        assert!(out.contains("/test/simple: count=4 avg=25.00ms success=75.0%"), "{out}");
    }

    #[test]
    fn header_describes_the_plan() {
        let out = render_header(&header());
        assert!(out.contains("target: http://localhost:8000 timeout=10.00s endpoints=6"));
        assert!(out.contains("plan: concurrency=20 requests=500"));
    }
}
