use std::time::Duration;

/// One leg of a ramping profile: move linearly to `target` users over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone)]
pub struct RampingSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampingSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Index of the stage covering `elapsed`, clamped to the last stage.
    pub fn stage_index(&self, elapsed: Duration) -> Option<usize> {
        if self.stages.is_empty() {
            return None;
        }
        let idx = match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) | Err(i) => i,
        };
        Some(idx.min(self.stages.len() - 1))
    }

    fn stage_bounds(&self, idx: usize) -> (Duration, Duration, u64, u64) {
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let start_target = if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        };
        (
            stage_start,
            self.cumulative_ends[idx],
            start_target,
            self.stages[idx].target,
        )
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed == Duration::ZERO {
            return self.start;
        }

        let Some(idx) = self.stage_index(elapsed) else {
            return self.start;
        };
        if elapsed >= self.total_duration() {
            return self.stages[idx].target;
        }

        let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        if stage_duration.is_zero() {
            return end_target;
        }

        // Linear interpolation across the stage.
        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;
        let num = elapsed.saturating_sub(stage_start).as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + (delta.saturating_mul(num) / den.max(1));
        cur.clamp(0, u64::MAX as i128) as u64
    }

    /// Users per second needed to follow the stage covering `elapsed`.
    ///
    /// Flat and ramp-down stages report at least one user per second.
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        let Some(idx) = self.stage_index(elapsed) else {
            return 1.0;
        };
        let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);
        let secs = stage_end.saturating_sub(stage_start).as_secs_f64();
        let delta = end_target.abs_diff(start_target) as f64;
        if secs <= 0.0 {
            return delta.max(1.0);
        }
        (delta / secs).max(1.0)
    }
}
