use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const MESSAGE_REFRESH: Duration = Duration::from_millis(200);

/// Where the run stands, in whatever unit its length is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Count { done: u64, total: u64 },
    Elapsed { elapsed: Duration, total: Duration },
    Unbounded,
}

pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    bar: Option<ProgressBar>,
    last_message: Option<Instant>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// `message` is only evaluated when the text is due for a refresh.
    pub(crate) fn update(&self, position: Position, message: impl FnOnce() -> String) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner
            .bar
            .get_or_insert_with(|| new_bar(position))
            .clone();

        match position {
            Position::Count { done, total } => {
                pb.set_length(total);
                pb.set_position(done.min(total));
            }
            Position::Elapsed { elapsed, total } => {
                let total_ms = total.as_millis() as u64;
                pb.set_length(total_ms);
                pb.set_position((elapsed.as_millis() as u64).min(total_ms));
            }
            Position::Unbounded => pb.tick(),
        }

        let now = Instant::now();
        let due = inner
            .last_message
            .is_none_or(|last| now.duration_since(last) >= MESSAGE_REFRESH);
        if due {
            inner.last_message = Some(now);
            pb.set_message(message());
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = inner.bar.take() {
            pb.finish_and_clear();
        }
    }
}

fn new_bar(position: Position) -> ProgressBar {
    let target = ProgressDrawTarget::stderr_with_hz(5);
    match position {
        Position::Count { .. } | Position::Elapsed { .. } => {
            let pb = ProgressBar::with_draw_target(Some(0), target);
            pb.set_style(bar_style());
            pb
        }
        Position::Unbounded => {
            let pb = ProgressBar::with_draw_target(None, target);
            pb.set_style(spinner_style());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
