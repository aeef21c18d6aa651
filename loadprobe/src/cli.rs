use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

fn parse_stage(input: &str) -> Result<loadprobe_core::Stage, String> {
    let (duration, target) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:50)"))?;
    let duration = parse_duration(duration)?;
    let target: u64 = target
        .trim()
        .parse()
        .map_err(|_| format!("invalid stage target in '{input}'"))?;
    Ok(loadprobe_core::Stage::new(duration, target))
}

fn parse_window(input: &str) -> Result<loadprobe_core::SpikeWindow, String> {
    let mut parts = input.split(':');
    let (Some(until), Some(users), Some(rate), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!(
            "invalid window '{input}' (expected UNTIL:USERS:RATE, e.g. 60s:100:50)"
        ));
    };
    let until = parse_duration(until)?;
    let users: u64 = users
        .trim()
        .parse()
        .map_err(|_| format!("invalid window users in '{input}'"))?;
    let rate: f64 = rate
        .trim()
        .parse()
        .map_err(|_| format!("invalid window spawn rate in '{input}'"))?;
    Ok(loadprobe_core::SpikeWindow::new(until, users, rate))
}

fn parse_error_rate(input: &str) -> Result<f64, String> {
    let v: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid error rate '{input}' (expected a number in 0..=1)"))?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("error rate '{input}' must be within 0..=1"));
    }
    Ok(v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit a single JSON summary line to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ShapeKind {
    /// Add a fixed number of users every step until the time limit.
    Step,
    /// Baseline, spike, sustained spike, recovery.
    Spike,
    /// Linear ramping stages from `--stage`.
    Stages,
}

#[derive(Debug, Parser)]
#[command(
    name = "loadprobe",
    author,
    version,
    about = "Bounded-concurrency HTTP load generator",
    long_about = "loadprobe drives HTTP GET traffic against a set of endpoints and reports latency percentiles, status codes and per-endpoint statistics.\n\n`run` issues a fixed number of requests (or runs for a duration) with bounded concurrency.\n`shape` simulates users whose number follows a step, spike or staged load shape.",
    after_help = "Examples:\n  loadprobe run --base-url http://localhost:8000 --concurrency 20 --requests 500\n  loadprobe run --weighted --duration 30s --output json\n  loadprobe run --profile profile.yaml --max-p95 250\n  loadprobe shape --shape spike --dry-run"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fire a fixed number of requests (or run for a duration) with bounded concurrency
    Run(RunArgs),

    /// Simulate users whose number follows a load shape
    Shape(ShapeArgs),
}

/// Flags shared by every command that sends traffic.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Base URL of the target application
    #[arg(long, env = "LOADPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout (e.g. 10s, 500ms)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Endpoint path to hit (repeatable); replaces the built-in set
    #[arg(long = "endpoint", value_name = "PATH")]
    pub endpoints: Vec<String>,

    /// Use the weighted built-in endpoint set instead of uniform selection
    #[arg(long)]
    pub weighted: bool,

    /// Seed for deterministic endpoint selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// YAML profile with target, endpoints and expectations
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Print one line per finished request instead of a progress bar
    #[arg(long)]
    pub print_requests: bool,

    /// Fail (exit 11) when P95 latency exceeds this many milliseconds
    #[arg(long, value_name = "MS")]
    pub max_p95: Option<f64>,

    /// Fail (exit 11) when P99 latency exceeds this many milliseconds
    #[arg(long, value_name = "MS")]
    pub max_p99: Option<f64>,

    /// Fail (exit 11) when failed/total exceeds this ratio (0..=1)
    #[arg(long, value_name = "RATIO", value_parser = parse_error_rate)]
    pub max_error_rate: Option<f64>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Maximum requests in flight
    #[arg(long)]
    pub concurrency: Option<u64>,

    /// Total requests to send
    #[arg(long)]
    pub requests: Option<u64>,

    /// Run for this long instead of a fixed request count (e.g. 30s, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct ShapeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Load shape to follow
    #[arg(long, value_enum, default_value_t = ShapeKind::Step)]
    pub shape: ShapeKind,

    /// Step shape: time per step
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub step_time: Duration,

    /// Step shape: users added per step
    #[arg(long, default_value_t = 10)]
    pub step_load: u64,

    /// Step shape: users started per second
    #[arg(long, default_value_t = 10.0)]
    pub spawn_rate: f64,

    /// Step shape: stop after this long
    #[arg(long, value_parser = parse_duration, default_value = "300s")]
    pub time_limit: Duration,

    /// Stages shape: ramp to TARGET users over DURATION (repeatable, e.g. 30s:50)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<loadprobe_core::Stage>,

    /// Spike shape: hold USERS until UNTIL, spawning RATE per second (repeatable,
    /// e.g. 60s:10:5); replaces the built-in spike
    #[arg(long = "window", value_name = "UNTIL:USERS:RATE", value_parser = parse_window)]
    pub windows: Vec<loadprobe_core::SpikeWindow>,

    /// Minimum pause between two requests of one user
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub think_min: Duration,

    /// Maximum pause between two requests of one user
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    pub think_max: Duration,

    /// How often the shape is polled
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub tick: Duration,

    /// Print the target table without sending traffic
    #[arg(long)]
    pub dry_run: bool,
}
