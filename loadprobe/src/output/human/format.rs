use std::time::Duration;

use loadprobe_core::{LiveStats, Outcome, RequestOutcome};

use crate::output::truncate_chars;

const ERROR_PREVIEW_CHARS: usize = 50;

pub(crate) fn format_ms(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}ms")
    } else {
        "n/a".to_string()
    }
}

pub(crate) fn format_ms_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), format_ms)
}

pub(crate) fn format_duration(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"))
}

pub(crate) fn live_message(live: &LiveStats) -> String {
    format!(
        "requests={} failed={} p50={} p95={}",
        live.total,
        live.failed,
        format_ms_opt(live.p50_ms),
        format_ms_opt(live.p95_ms)
    )
}

/// One `--print-requests` line.
pub(crate) fn request_line(o: &RequestOutcome) -> String {
    let mark = if o.outcome.is_success() { '✓' } else { '✗' };
    let head = format!("{mark} [{:04}] {}", o.id, o.endpoint);
    let ms = o.latency_ms.round() as u64;

    match &o.outcome {
        Outcome::Success { status } | Outcome::HttpError(status) => {
            format!("{head} - {status} - {ms}ms")
        }
        Outcome::Timeout => format!("{head} - TIMEOUT"),
        Outcome::CheckFailed { reason, .. } => {
            format!("{head} - ERROR: {}", truncate_chars(reason, ERROR_PREVIEW_CHARS))
        }
        Outcome::TransportError { message, .. } => {
            format!("{head} - ERROR: {}", truncate_chars(message, ERROR_PREVIEW_CHARS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn outcome(id: u64, outcome: Outcome, latency_ms: f64) -> RequestOutcome {
        RequestOutcome {
            id,
            endpoint: "/test/simple".into(),
            outcome,
            latency_ms,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn request_lines_match_outcome_kind() {
        assert_eq!(
            request_line(&outcome(1, Outcome::Success { status: 200 }, 11.6)),
            "✓ [0001] /test/simple - 200 - 12ms"
        );
        assert_eq!(
            request_line(&outcome(12, Outcome::HttpError(503), 4.0)),
            "✗ [0012] /test/simple - 503 - 4ms"
        );
        assert_eq!(
            request_line(&outcome(7, Outcome::Timeout, 10_000.0)),
            "✗ [0007] /test/simple - TIMEOUT"
        );

        let long = "x".repeat(80);
        let line = request_line(&outcome(
            3,
            Outcome::TransportError {
                kind: "request".to_string(),
                message: long,
            },
            1.0,
        ));
        assert_eq!(line, format!("✗ [0003] /test/simple - ERROR: {}", "x".repeat(50)));
    }

    #[test]
    fn numbers_render_with_units() {
        assert_eq!(format_ms(12.345), "12.35ms");
        assert_eq!(format_ms(f64::NAN), "n/a");
        assert_eq!(format_ms_opt(None), "-");
        assert_eq!(format_duration(Duration::from_millis(2350)), "2.35s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_pct(Some(12.34)), "12.3%");
        assert_eq!(format_pct(None), "n/a");
    }
}
