use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use loadprobe_core::{
    DriverReport, Endpoint, EndpointSelector, RequestRunner, StatRecorder, UniformSelector,
    WeightedSelector,
};
use loadprobe_http::{ClientConfig, HttpClient};

use crate::cli::TargetArgs;
use crate::exit_codes::ExitCode;
use crate::output::{ReportFormatter, RunHeader, RunReport};
use crate::profile::{self, Profile, Selection, Target};
use crate::run_error::RunError;

/// Either selection policy behind one concrete type.
pub(crate) enum Selector {
    Uniform(UniformSelector),
    Weighted(WeightedSelector),
}

impl Selector {
    pub(crate) fn for_target(target: &Target) -> loadprobe_core::Result<Self> {
        let endpoints = target.endpoints.clone();
        Ok(match target.selection {
            Selection::Uniform => Self::Uniform(UniformSelector::new(endpoints, target.seed)?),
            Selection::Weighted => Self::Weighted(WeightedSelector::new(endpoints, target.seed)?),
        })
    }
}

impl EndpointSelector for Selector {
    fn select(&self) -> &Endpoint {
        match self {
            Self::Uniform(s) => s.select(),
            Self::Weighted(s) => s.select(),
        }
    }

    fn endpoints(&self) -> &[Endpoint] {
        match self {
            Self::Uniform(s) => s.endpoints(),
            Self::Weighted(s) => s.endpoints(),
        }
    }
}

pub(crate) async fn load_profile(args: &TargetArgs) -> Result<Profile, RunError> {
    match &args.profile {
        Some(path) => profile::load(path).await.map_err(RunError::InvalidInput),
        None => Ok(Profile::default()),
    }
}

/// Connecting may take as long as the longest request timeout of the run.
pub(crate) fn client_config(target: &Target) -> ClientConfig {
    let longest = target
        .endpoints
        .iter()
        .filter_map(|e| e.timeout)
        .fold(target.timeout, Duration::max);
    ClientConfig::default().with_connect_timeout(Some(longest))
}

pub(crate) fn build_runner(
    target: &Target,
    out: &dyn ReportFormatter,
    header: &RunHeader,
) -> Result<Arc<RequestRunner<HttpClient>>, RunError> {
    let client = HttpClient::with_config(&client_config(target))
        .context("failed to build http client")
        .map_err(RunError::RuntimeError)?;
    let recorder = Arc::new(StatRecorder::new());
    let mut runner = RequestRunner::new(
        client,
        &target.base_url,
        target.timeout,
        recorder.clone(),
    )?;
    if let Some(observer) = out.observer(&recorder, header) {
        runner = runner.with_observer(observer);
    }
    Ok(Arc::new(runner))
}

/// Resolves on Ctrl-C. Never resolves when the handler cannot be installed.
pub(crate) async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Prints the report and turns the run's outcome into an exit code.
pub(crate) fn finish(
    out: &dyn ReportFormatter,
    header: &RunHeader,
    target: &Target,
    driver: &DriverReport,
) -> Result<ExitCode, RunError> {
    let violations = target.thresholds.evaluate(&driver.snapshot);

    out.print_summary(&RunReport {
        header,
        driver,
        violations: &violations,
    })
    .context("failed to print summary")
    .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_run(driver.interrupted, !violations.is_empty()))
}
