use std::sync::Arc;
use std::time::Duration;

use loadprobe_core::{
    DriverReport, OutcomeFn, ShapeProgressFn, StatRecorder, ThresholdViolation,
};

use crate::cli::OutputFormat;

mod human;
mod json;

/// What is about to run, printed before traffic starts.
#[derive(Debug, Clone)]
pub(crate) struct RunHeader {
    pub base_url: String,
    pub timeout: Duration,
    pub endpoints: usize,
    pub plan: PlanHeader,
}

#[derive(Debug, Clone)]
pub(crate) enum PlanHeader {
    Fixed {
        concurrency: u64,
        requests: Option<u64>,
        duration: Option<Duration>,
    },
    Shaped {
        shape: &'static str,
        tick: Duration,
        total: Option<Duration>,
    },
}

impl PlanHeader {
    /// Known length of the run, for progress bars.
    pub(crate) fn total_duration(&self) -> Option<Duration> {
        match self {
            Self::Fixed { duration, .. } => *duration,
            Self::Shaped { total, .. } => *total,
        }
    }
}

pub(crate) struct RunReport<'a> {
    pub header: &'a RunHeader,
    pub driver: &'a DriverReport,
    pub violations: &'a [ThresholdViolation],
}

pub(crate) trait ReportFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader);

    /// Called once per finished request.
    fn observer(&self, recorder: &Arc<StatRecorder>, header: &RunHeader) -> Option<OutcomeFn>;

    /// Called once per shape tick.
    fn shape_progress(&self, header: &RunHeader) -> Option<ShapeProgressFn>;

    fn print_summary(&self, report: &RunReport<'_>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat, print_requests: bool) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new(print_requests)),
        OutputFormat::Json => Box::new(json::JsonOutput::new(print_requests)),
    }
}

fn print_violations(violations: &[ThresholdViolation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("thresholds failed: {}", violations.len());
    for v in violations {
        eprintln!("  {v}");
    }
}

fn print_interrupted(report: &DriverReport) {
    if report.interrupted {
        eprintln!(
            "interrupted: statistics cover the {} requests that finished",
            report.snapshot.total
        );
    }
}

/// Truncates to at most `max` characters without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
