use std::sync::Arc;

use loadprobe_core::{LoadDriver, LoadPlan};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, PlanHeader, RunHeader};
use crate::profile::{resolve_run_size, resolve_target};
use crate::run_error::RunError;
use crate::run_support::{Selector, build_runner, ctrl_c, finish, load_profile};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.target.output, args.target.print_requests);

    let profile = load_profile(&args.target).await?;
    let target = resolve_target(&args.target, &profile).map_err(RunError::InvalidInput)?;
    let size = resolve_run_size(&args, &profile);

    let plan = LoadPlan {
        requests: size.requests,
        duration: size.duration,
        concurrency: size.concurrency,
    };
    plan.validate()?;

    let header = RunHeader {
        base_url: target.base_url.clone(),
        timeout: target.timeout,
        endpoints: target.endpoints.len(),
        plan: PlanHeader::Fixed {
            concurrency: plan.concurrency,
            requests: plan.requests,
            duration: plan.duration,
        },
    };

    let selector = Selector::for_target(&target)?;
    let runner = build_runner(&target, out.as_ref(), &header)?;
    let driver = LoadDriver::new(runner, Arc::new(selector));

    out.print_header(&header);
    let report = driver.run(&plan, ctrl_c()).await?;

    finish(out.as_ref(), &header, &target, &report)
}
