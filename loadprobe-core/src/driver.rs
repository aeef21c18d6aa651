use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::gate::RequestGate;
use crate::request::RequestRunner;
use crate::select::EndpointSelector;
use crate::stats::StatSnapshot;
use crate::transport::Transport;

/// Upper bound on workers of a run and on simulated users of a shaped run.
pub const MAX_CONCURRENCY: u64 = 100_000;

/// How much work to run and how wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    /// Total requests to issue. `None` requires `duration`.
    pub requests: Option<u64>,
    /// Keep issuing requests until this much wall-clock time has passed.
    pub duration: Option<Duration>,
    /// Maximum requests in flight at once.
    pub concurrency: u64,
}

impl LoadPlan {
    pub fn fixed(requests: u64, concurrency: u64) -> Self {
        Self {
            requests: Some(requests),
            duration: None,
            concurrency,
        }
    }

    pub fn timed(duration: Duration, concurrency: u64) -> Self {
        Self {
            requests: None,
            duration: Some(duration),
            concurrency,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::InvalidConcurrency);
        }
        match (self.requests, self.duration) {
            (Some(0), _) | (None, None) => Err(Error::InvalidRequests),
            (None, Some(d)) if d.is_zero() => Err(Error::InvalidRequests),
            _ => Ok(()),
        }
    }

    fn workers(&self) -> u64 {
        match self.requests {
            Some(total) => self.concurrency.min(total),
            None => self.concurrency,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverReport {
    pub snapshot: StatSnapshot,
    pub elapsed: Duration,
    /// The run was cancelled before the plan completed; `snapshot` is partial.
    pub interrupted: bool,
}

/// Runs a [`LoadPlan`] on a pool of `concurrency` workers.
///
/// Each worker claims a request id from a shared [`RequestGate`], picks an endpoint and
/// awaits the request before claiming the next one, so the pool width is the concurrency
/// bound and no more than `concurrency` tasks ever exist, however large the plan.
pub struct LoadDriver<T, S> {
    runner: Arc<RequestRunner<T>>,
    selector: Arc<S>,
}

impl<T, S> LoadDriver<T, S>
where
    T: Transport,
    S: EndpointSelector,
{
    pub fn new(runner: Arc<RequestRunner<T>>, selector: Arc<S>) -> Self {
        Self { runner, selector }
    }

    /// Resolves once every claimed request has finished, or once `cancel` resolves.
    ///
    /// On cancellation no new ids are handed out and in-flight requests are abandoned;
    /// outcomes recorded so far stay in the snapshot.
    pub async fn run<C>(&self, plan: &LoadPlan, cancel: C) -> Result<DriverReport>
    where
        C: Future<Output = ()>,
    {
        plan.validate()?;

        let gate = Arc::new(RequestGate::new(plan.requests, plan.duration));
        let workers = plan.workers();

        tracing::info!(
            base_url = self.runner.base_url(),
            requests = ?plan.requests,
            duration = ?plan.duration,
            concurrency = plan.concurrency,
            workers,
            "load run starting"
        );

        let started = Instant::now();
        gate.start_at(started);

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let gate = gate.clone();
            let runner = self.runner.clone();
            let selector = self.selector.clone();
            set.spawn(async move {
                while let Some(id) = gate.next() {
                    let endpoint = selector.select();
                    runner.execute(id, endpoint).await;
                }
            });
        }

        let mut interrupted = false;
        let mut join_error = None;
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(err)) if err.is_cancelled() && interrupted => {}
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "load worker failed");
                        join_error.get_or_insert(err);
                    }
                },
                () = &mut cancel, if !interrupted => {
                    interrupted = true;
                    gate.close();
                    set.abort_all();
                    tracing::warn!(claimed = gate.claimed(), "load run cancelled");
                }
            }
        }

        if let Some(err) = join_error {
            return Err(Error::Join(err));
        }

        let elapsed = started.elapsed();
        let snapshot = self.runner.recorder().snapshot();
        tracing::info!(
            total = snapshot.total,
            failed = snapshot.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            interrupted,
            "load run finished"
        );

        Ok(DriverReport {
            snapshot,
            elapsed,
            interrupted,
        })
    }
}
