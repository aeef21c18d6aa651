use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use loadprobe_core::{OutcomeFn, RequestOutcome, ShapeProgress, ShapeProgressFn, StatRecorder};

mod format;
mod progress;
mod summary;

use format::{format_rate, live_message, request_line};
use progress::{HumanProgress, Position};
use summary::{render, render_header};

use super::{PlanHeader, ReportFormatter, RunHeader, RunReport, print_interrupted, print_violations};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
    print_requests: bool,
}

impl HumanReadableOutput {
    pub(crate) fn new(print_requests: bool) -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
            print_requests,
        }
    }
}

impl ReportFormatter for HumanReadableOutput {
    fn print_header(&self, header: &RunHeader) {
        print!("{}", render_header(header));
    }

    fn observer(&self, recorder: &Arc<StatRecorder>, header: &RunHeader) -> Option<OutcomeFn> {
        if self.print_requests {
            return Some(Arc::new(|o: &RequestOutcome| {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", request_line(o));
            }));
        }

        // Shaped runs report progress per tick instead.
        let PlanHeader::Fixed {
            requests, duration, ..
        } = header.plan
        else {
            return None;
        };

        let progress = self.progress.clone();
        let recorder = recorder.clone();
        let started = Instant::now();

        Some(Arc::new(move |_: &RequestOutcome| {
            let position = match (requests, duration) {
                (Some(total), _) => Position::Count {
                    done: recorder.total(),
                    total,
                },
                (None, Some(total)) => Position::Elapsed {
                    elapsed: started.elapsed(),
                    total,
                },
                (None, None) => Position::Unbounded,
            };
            progress.update(position, || live_message(&recorder.live()));
        }))
    }

    fn shape_progress(&self, header: &RunHeader) -> Option<ShapeProgressFn> {
        if self.print_requests {
            return None;
        }

        let progress = self.progress.clone();
        let total = header.plan.total_duration();

        Some(Arc::new(move |p: &ShapeProgress| {
            let position = match total {
                Some(total) => Position::Elapsed {
                    elapsed: p.elapsed,
                    total,
                },
                None => Position::Unbounded,
            };
            progress.update(position, || {
                format!(
                    "users={}/{} spawn_rate={}/s {}",
                    p.active,
                    p.target,
                    format_rate(p.spawn_rate),
                    live_message(&p.live)
                )
            });
        }))
    }

    fn print_summary(&self, report: &RunReport<'_>) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(report));
        print_interrupted(report.driver);
        print_violations(report.violations);
        Ok(())
    }
}
