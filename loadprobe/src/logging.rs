use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `loadprobe_core=debug`).
pub(crate) const LOG_ENV: &str = "LOADPROBE_LOG";

/// Installs a stderr `fmt` subscriber. Logs stay quiet (`warn`) unless `LOADPROBE_LOG` says
/// otherwise, so they never mix with the report on stdout.
pub(crate) fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
