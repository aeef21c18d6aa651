use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::driver::{DriverReport, MAX_CONCURRENCY};
use crate::error::{Error, Result};
use crate::request::RequestRunner;
use crate::select::EndpointSelector;
use crate::shape::{LoadShape, ShapeTick};
use crate::stats::LiveStats;
use crate::transport::Transport;

/// Pause between two requests of one simulated user, drawn uniformly from `min..=max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn sample(&self, rng: &mut fastrand::Rng) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        self.min + (self.max - self.min).mul_f64(rng.f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapedPlan {
    /// How often the shape is polled.
    pub tick: Duration,
    pub think_time: ThinkTime,
    pub seed: Option<u64>,
    /// Shape targets above this are clamped.
    pub max_users: u64,
}

impl Default for ShapedPlan {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            think_time: ThinkTime::new(Duration::from_secs(1), Duration::from_secs(3)),
            seed: None,
            max_users: MAX_CONCURRENCY,
        }
    }
}

impl ShapedPlan {
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(Error::InvalidShape("tick interval must be non-zero".to_string()));
        }
        if self.think_time.min > self.think_time.max {
            return Err(Error::InvalidShape(
                "think time minimum exceeds maximum".to_string(),
            ));
        }
        if self.max_users == 0 || self.max_users > MAX_CONCURRENCY {
            return Err(Error::InvalidShape(format!(
                "user limit must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeProgress {
    /// 1-based.
    pub tick: u64,
    pub elapsed: Duration,
    pub target: u64,
    /// Users allowed to issue requests after this tick.
    pub active: u64,
    pub spawn_rate: f64,
    pub live: LiveStats,
}

pub type ShapeProgressFn = Arc<dyn Fn(&ShapeProgress) + Send + Sync + 'static>;

/// Moves `active` toward `target`: up by at most the accumulated spawn budget, down at once.
#[derive(Debug, Default)]
struct Ramp {
    active: u64,
    carry: f64,
}

impl Ramp {
    fn step(&mut self, target: u64, spawn_rate: f64, dt: Duration) -> u64 {
        if target <= self.active {
            self.active = target;
            self.carry = 0.0;
            return self.active;
        }

        self.carry += spawn_rate.max(0.0) * dt.as_secs_f64();
        let budget = self.carry.floor();
        self.carry -= budget;

        let add = (budget as u64).min(target - self.active);
        self.active += add;
        if self.active == target {
            self.carry = 0.0;
        }
        self.active
    }
}

/// Runs simulated users whose number follows a [`LoadShape`].
///
/// User `i` (1-based) loops while `i <= active`: pick an endpoint, run the request, think.
/// Users above the active count park until it rises again. Users are spawned the first
/// time the active count reaches them and live until the run ends.
pub struct ShapedDriver<T, S, L> {
    runner: Arc<RequestRunner<T>>,
    selector: Arc<S>,
    shape: Arc<L>,
    progress: Option<ShapeProgressFn>,
}

impl<T, S, L> ShapedDriver<T, S, L>
where
    T: Transport,
    S: EndpointSelector,
    L: LoadShape,
{
    pub fn new(runner: Arc<RequestRunner<T>>, selector: Arc<S>, shape: Arc<L>) -> Self {
        Self {
            runner,
            selector,
            shape,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ShapeProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolves when the shape returns [`ShapeTick::Stop`] or `cancel` resolves.
    ///
    /// Either way every user is stopped and requests still in flight are abandoned.
    pub async fn run<C>(&self, plan: &ShapedPlan, cancel: C) -> Result<DriverReport>
    where
        C: Future<Output = ()>,
    {
        plan.validate()?;

        let (active_tx, active_rx) = watch::channel(0u64);
        let ids = Arc::new(AtomicU64::new(0));
        let mut users = JoinSet::new();
        let mut spawned = 0u64;
        let mut ramp = Ramp::default();

        let started = Instant::now();
        let mut interval = tokio::time::interval(plan.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            base_url = self.runner.base_url(),
            tick_ms = plan.tick.as_millis() as u64,
            "shaped run starting"
        );

        let mut interrupted = false;
        let mut clamped = false;
        let mut tick_id = 0u64;
        let mut last_at: Option<Instant> = None;
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = &mut cancel => {
                    interrupted = true;
                    tracing::warn!(spawned, "shaped run cancelled");
                    break;
                }
            }

            let now = Instant::now();
            let elapsed = now.duration_since(started);
            // The first tick spends one full interval of spawn budget.
            let dt = last_at.map_or(plan.tick, |prev| now.duration_since(prev));
            last_at = Some(now);
            tick_id += 1;

            let (target, spawn_rate) = match self.shape.tick(elapsed) {
                ShapeTick::Stop => {
                    tracing::debug!(tick = tick_id, ?elapsed, "shape stopped");
                    break;
                }
                ShapeTick::Target { users, spawn_rate } => (users, spawn_rate),
            };
            if target > plan.max_users && !clamped {
                clamped = true;
                tracing::warn!(target, max_users = plan.max_users, "shape target clamped");
            }
            let target = target.min(plan.max_users);

            let active = ramp.step(target, spawn_rate, dt);
            while spawned < active {
                spawned += 1;
                users.spawn(user_loop(
                    spawned,
                    active_rx.clone(),
                    ids.clone(),
                    self.runner.clone(),
                    self.selector.clone(),
                    plan.think_time,
                    user_rng(plan.seed, spawned),
                ));
            }
            active_tx.send_replace(active);

            tracing::debug!(tick = tick_id, ?elapsed, target, active, spawn_rate, "shape tick");

            if let Some(progress) = &self.progress {
                progress(&ShapeProgress {
                    tick: tick_id,
                    elapsed,
                    target,
                    active,
                    spawn_rate,
                    live: self.runner.recorder().live(),
                });
            }
        }

        active_tx.send_replace(0);
        users.abort_all();
        let mut join_error = None;
        while let Some(joined) = users.join_next().await {
            if let Err(err) = joined
                && !err.is_cancelled()
            {
                tracing::error!(error = %err, "simulated user failed");
                join_error.get_or_insert(err);
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
            users = spawned,
            elapsed_ms = elapsed.as_millis() as u64,
            interrupted,
            "shaped run finished"
        );

        Ok(DriverReport {
            snapshot,
            elapsed,
            interrupted,
        })
    }
}

fn user_rng(seed: Option<u64>, index: u64) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed.wrapping_add(index)),
        None => fastrand::Rng::new(),
    }
}

async fn user_loop<T, S>(
    index: u64,
    mut active: watch::Receiver<u64>,
    ids: Arc<AtomicU64>,
    runner: Arc<RequestRunner<T>>,
    selector: Arc<S>,
    think_time: ThinkTime,
    mut rng: fastrand::Rng,
) where
    T: Transport,
    S: EndpointSelector,
{
    loop {
        let allowed = active.wait_for(|&n| n >= index).await.is_ok();
        if !allowed {
            return;
        }

        let id = ids.fetch_add(1, Ordering::Relaxed) + 1;
        runner.execute(id, selector.select()).await;

        let pause = think_time.sample(&mut rng);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}
