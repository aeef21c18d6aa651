//! Time-varying user targets for shaped runs.
//!
//! A shape is a pure function of elapsed time. The driver polls it on every tick and
//! moves its active user count toward the returned target.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::schedule::{RampingSchedule, Stage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeTick {
    /// Hold `users` simulated users, adding at most `spawn_rate` of them per second.
    Target { users: u64, spawn_rate: f64 },
    Stop,
}

pub trait LoadShape: Send + Sync + 'static {
    fn tick(&self, elapsed: Duration) -> ShapeTick;
}

impl<F> LoadShape for F
where
    F: Fn(Duration) -> ShapeTick + Send + Sync + 'static,
{
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        self(elapsed)
    }
}

/// Samples `shape` every `tick` from zero until it stops, for at most `max_ticks` rows.
pub fn preview<L: LoadShape + ?Sized>(
    shape: &L,
    tick: Duration,
    max_ticks: usize,
) -> Vec<(Duration, u64, f64)> {
    let mut rows = Vec::new();
    let mut elapsed = Duration::ZERO;
    while rows.len() < max_ticks {
        match shape.tick(elapsed) {
            ShapeTick::Stop => break,
            ShapeTick::Target { users, spawn_rate } => rows.push((elapsed, users, spawn_rate)),
        }
        elapsed += tick;
    }
    rows
}

fn check_rate(spawn_rate: f64) -> Result<()> {
    if spawn_rate.is_finite() && spawn_rate > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidShape(format!(
            "spawn rate must be positive, got {spawn_rate}"
        )))
    }
}

/// Adds `step_load` users every `step_time` until `time_limit` has passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepShape {
    pub step_time: Duration,
    pub step_load: u64,
    pub spawn_rate: f64,
    pub time_limit: Duration,
}

impl Default for StepShape {
    fn default() -> Self {
        Self {
            step_time: Duration::from_secs(30),
            step_load: 10,
            spawn_rate: 10.0,
            time_limit: Duration::from_secs(300),
        }
    }
}

impl StepShape {
    pub fn validate(&self) -> Result<()> {
        if self.step_time.is_zero() {
            return Err(Error::InvalidShape("step time must be non-zero".to_string()));
        }
        if self.step_load == 0 {
            return Err(Error::InvalidShape("step load must be non-zero".to_string()));
        }
        check_rate(self.spawn_rate)
    }
}

impl LoadShape for StepShape {
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        if elapsed > self.time_limit {
            return ShapeTick::Stop;
        }
        let step = elapsed.as_nanos() / self.step_time.as_nanos().max(1);
        let steps = u64::try_from(step).unwrap_or(u64::MAX).saturating_add(1);
        ShapeTick::Target {
            users: steps.saturating_mul(self.step_load),
            spawn_rate: self.spawn_rate,
        }
    }
}

/// A constant target held until `until` (measured from the start of the run).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeWindow {
    pub until: Duration,
    pub users: u64,
    pub spawn_rate: f64,
}

impl SpikeWindow {
    pub fn new(until: Duration, users: u64, spawn_rate: f64) -> Self {
        Self {
            until,
            users,
            spawn_rate,
        }
    }
}

/// Piecewise-constant targets. Stops once the last window has closed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeShape {
    windows: Vec<SpikeWindow>,
}

impl Default for SpikeShape {
    /// Baseline, spike, sustained spike, recovery.
    fn default() -> Self {
        let s = Duration::from_secs;
        Self {
            windows: vec![
                SpikeWindow::new(s(60), 10, 5.0),
                SpikeWindow::new(s(90), 100, 50.0),
                SpikeWindow::new(s(150), 100, 50.0),
                SpikeWindow::new(s(180), 10, 10.0),
            ],
        }
    }
}

impl SpikeShape {
    /// Windows must be non-empty with strictly increasing end times.
    pub fn new(windows: Vec<SpikeWindow>) -> Result<Self> {
        if windows.is_empty() {
            return Err(Error::InvalidShape("spike shape needs at least one window".to_string()));
        }
        for pair in windows.windows(2) {
            if pair[1].until <= pair[0].until {
                return Err(Error::InvalidShape(
                    "spike windows must end in increasing order".to_string(),
                ));
            }
        }
        for w in &windows {
            check_rate(w.spawn_rate)?;
        }
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[SpikeWindow] {
        &self.windows
    }
}

impl LoadShape for SpikeShape {
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        self.windows
            .iter()
            .find(|w| elapsed < w.until)
            .map_or(ShapeTick::Stop, |w| ShapeTick::Target {
                users: w.users,
                spawn_rate: w.spawn_rate,
            })
    }
}

/// Linear ramping stages starting from zero users. Stops after the last stage.
#[derive(Debug, Clone)]
pub struct StagedShape {
    schedule: RampingSchedule,
}

impl StagedShape {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.iter().all(|s| s.duration.is_zero()) {
            return Err(Error::InvalidStages);
        }
        Ok(Self {
            schedule: RampingSchedule::new(0, stages),
        })
    }

    pub fn schedule(&self) -> &RampingSchedule {
        &self.schedule
    }
}

impl LoadShape for StagedShape {
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        if elapsed > self.schedule.total_duration() {
            return ShapeTick::Stop;
        }
        ShapeTick::Target {
            users: self.schedule.target_at(elapsed),
            spawn_rate: self.schedule.rate_at(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn users(tick: ShapeTick) -> Option<u64> {
        match tick {
            ShapeTick::Target { users, .. } => Some(users),
            ShapeTick::Stop => None,
        }
    }

    #[test]
    fn step_adds_one_step_per_interval() {
        let shape = StepShape::default();
        assert_eq!(users(shape.tick(Duration::ZERO)), Some(10));
        assert_eq!(users(shape.tick(secs(29))), Some(10));
        assert_eq!(users(shape.tick(secs(30))), Some(20));
        assert_eq!(users(shape.tick(secs(45))), Some(20));
        assert_eq!(users(shape.tick(secs(300))), Some(110));
        assert_eq!(shape.tick(secs(305)), ShapeTick::Stop);
    }

    #[test]
    fn step_validation() {
        assert!(StepShape::default().validate().is_ok());
        let bad = StepShape {
            step_time: Duration::ZERO,
            ..StepShape::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidShape(_))));
        let bad = StepShape {
            spawn_rate: 0.0,
            ..StepShape::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidShape(_))));
    }

    #[test]
    fn default_spike_windows() {
        let shape = SpikeShape::default();
        assert_eq!(
            shape.tick(secs(0)),
            ShapeTick::Target {
                users: 10,
                spawn_rate: 5.0
            }
        );
        assert_eq!(
            shape.tick(secs(60)),
            ShapeTick::Target {
                users: 100,
                spawn_rate: 50.0
            }
        );
        assert_eq!(users(shape.tick(secs(149))), Some(100));
        assert_eq!(
            shape.tick(secs(170)),
            ShapeTick::Target {
                users: 10,
                spawn_rate: 10.0
            }
        );
        assert_eq!(shape.tick(secs(180)), ShapeTick::Stop);
    }

    #[test]
    fn spike_windows_must_be_ordered() {
        let err = SpikeShape::new(vec![
            SpikeWindow::new(secs(10), 1, 1.0),
            SpikeWindow::new(secs(5), 1, 1.0),
        ]);
        assert!(matches!(err, Err(Error::InvalidShape(_))));
        assert!(matches!(SpikeShape::new(Vec::new()), Err(Error::InvalidShape(_))));
    }

    #[test]
    fn staged_shape_ramps_then_stops() {
        let shape = StagedShape::new(vec![
            Stage::new(secs(10), 20),
            Stage::new(secs(10), 20),
            Stage::new(secs(10), 0),
        ])
        .unwrap();
        assert_eq!(users(shape.tick(secs(5))), Some(10));
        assert_eq!(users(shape.tick(secs(15))), Some(20));
        assert_eq!(users(shape.tick(secs(25))), Some(10));
        assert_eq!(users(shape.tick(secs(30))), Some(0));
        assert_eq!(shape.tick(secs(31)), ShapeTick::Stop);
        assert!(matches!(StagedShape::new(Vec::new()), Err(Error::InvalidStages)));
        assert!(matches!(
            StagedShape::new(vec![Stage::new(Duration::ZERO, 5)]),
            Err(Error::InvalidStages)
        ));
    }

    #[test]
    fn preview_runs_until_stop() {
        let rows = preview(&StepShape::default(), secs(30), 1000);
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0], (Duration::ZERO, 10, 10.0));
        assert_eq!(rows[10], (secs(300), 110, 10.0));

        let forever = |_: Duration| ShapeTick::Target {
            users: 1,
            spawn_rate: 1.0,
        };
        assert_eq!(preview(&forever, secs(1), 5).len(), 5);
    }

    #[test]
    fn closures_are_shapes() {
        let shape = |elapsed: Duration| {
            if elapsed < secs(1) {
                ShapeTick::Target {
                    users: 3,
                    spawn_rate: 3.0,
                }
            } else {
                ShapeTick::Stop
            }
        };
        assert_eq!(users(shape.tick(Duration::ZERO)), Some(3));
        assert_eq!(LoadShape::tick(&shape, secs(2)), ShapeTick::Stop);
    }
}
