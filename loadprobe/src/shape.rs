use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use loadprobe_core::{
    LoadShape, MAX_CONCURRENCY, ShapeTick, ShapedDriver, ShapedPlan, SpikeShape, StagedShape, StepShape, ThinkTime,
    preview,
};

use crate::cli::{ShapeArgs, ShapeKind};
use crate::exit_codes::ExitCode;
use crate::output::{self, PlanHeader, RunHeader};
use crate::profile::resolve_target;
use crate::run_error::RunError;
use crate::run_support::{Selector, build_runner, ctrl_c, finish, load_profile};

/// Upper bound on `--dry-run` rows.
const MAX_PREVIEW_TICKS: usize = 86_400;

/// The shape picked on the command line.
#[derive(Debug, Clone)]
pub(crate) enum Shape {
    Step(StepShape),
    Spike(SpikeShape),
    Staged(StagedShape),
}

impl Shape {
    pub(crate) fn from_args(args: &ShapeArgs) -> loadprobe_core::Result<Self> {
        Ok(match args.shape {
            ShapeKind::Step => {
                let shape = StepShape {
                    step_time: args.step_time,
                    step_load: args.step_load,
                    spawn_rate: args.spawn_rate,
                    time_limit: args.time_limit,
                };
                shape.validate()?;
                Self::Step(shape)
            }
            ShapeKind::Spike if args.windows.is_empty() => Self::Spike(SpikeShape::default()),
            ShapeKind::Spike => Self::Spike(SpikeShape::new(args.windows.clone())?),
            ShapeKind::Stages => Self::Staged(StagedShape::new(args.stages.clone())?),
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Step(_) => "step",
            Self::Spike(_) => "spike",
            Self::Staged(_) => "stages",
        }
    }

    /// When the shape stops on its own.
    pub(crate) fn length(&self) -> Duration {
        match self {
            Self::Step(s) => s.time_limit,
            Self::Spike(s) => s.windows().last().map_or(Duration::ZERO, |w| w.until),
            Self::Staged(s) => s.schedule().total_duration(),
        }
    }
}

impl LoadShape for Shape {
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        match self {
            Self::Step(s) => s.tick(elapsed),
            Self::Spike(s) => s.tick(elapsed),
            Self::Staged(s) => s.tick(elapsed),
        }
    }
}

pub(crate) fn render_preview(shape: &Shape, tick: Duration) -> String {
    let mut out = String::new();
    writeln!(&mut out, "{:>10} {:>8} {:>12}", "elapsed", "target", "spawn_rate").ok();
    for (elapsed, users, rate) in preview(shape, tick, MAX_PREVIEW_TICKS) {
        writeln!(
            &mut out,
            "{:>9.1}s {users:>8} {rate:>12.2}",
            elapsed.as_secs_f64()
        )
        .ok();
    }
    out
}

pub async fn shape(args: ShapeArgs) -> Result<ExitCode, RunError> {
    if args.tick.is_zero() {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "--tick must be greater than zero"
        )));
    }

    let shape = Shape::from_args(&args)?;
    if args.dry_run {
        print!("{}", render_preview(&shape, args.tick));
        return Ok(ExitCode::Success);
    }

    let out = output::formatter(args.target.output, args.target.print_requests);
    let profile = load_profile(&args.target).await?;
    let target = resolve_target(&args.target, &profile).map_err(RunError::InvalidInput)?;

    let plan = ShapedPlan {
        tick: args.tick,
        think_time: ThinkTime::new(args.think_min, args.think_max),
        seed: target.seed,
        max_users: MAX_CONCURRENCY,
    };
    plan.validate()?;

    let header = RunHeader {
        base_url: target.base_url.clone(),
        timeout: target.timeout,
        endpoints: target.endpoints.len(),
        plan: PlanHeader::Shaped {
            shape: shape.name(),
            tick: plan.tick,
            total: Some(shape.length()),
        },
    };

    let selector = Selector::for_target(&target)?;
    let runner = build_runner(&target, out.as_ref(), &header)?;
    let mut driver = ShapedDriver::new(runner, Arc::new(selector), Arc::new(shape));
    if let Some(progress) = out.shape_progress(&header) {
        driver = driver.with_progress(progress);
    }

    out.print_header(&header);
    let report = driver.run(&plan, ctrl_c()).await?;

    finish(out.as_ref(), &header, &target, &report)
}
