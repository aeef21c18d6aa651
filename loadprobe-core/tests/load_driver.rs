use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use loadprobe_core::{
    LoadDriver, LoadPlan, RequestRunner, SequenceSelector, StatRecorder, StatusKey, Transport,
    TransportError, TransportResponse, UniformSelector, default_endpoints,
};

#[derive(Debug, Clone, Copy)]
enum Reply {
    Status(u16),
    Stall,
}

#[derive(Debug)]
struct SimState {
    reply: Reply,
    min_ms: u64,
    spread_ms: u64,
    calls: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

/// In-process transport with scripted latency that tracks how many calls overlap.
#[derive(Debug, Clone)]
struct Simulated(Arc<SimState>);

impl Simulated {
    fn new(reply: Reply, min_ms: u64, max_ms: u64) -> Self {
        Self(Arc::new(SimState {
            reply,
            min_ms,
            spread_ms: max_ms - min_ms + 1,
            calls: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            max_in_flight: AtomicU64::new(0),
        }))
    }

    fn calls(&self) -> u64 {
        self.0.calls.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> u64 {
        self.0.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicU64);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for Simulated {
    async fn get(&self, _url: &str) -> Result<TransportResponse, TransportError> {
        let state = &self.0;
        let n = state.calls.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&state.in_flight);

        let latency = state.min_ms + (n * 7) % state.spread_ms;
        tokio::time::sleep(Duration::from_millis(latency)).await;

        match state.reply {
            Reply::Status(status) => Ok(TransportResponse {
                status,
                body: Bytes::from_static(br#"{"status":"ok"}"#),
            }),
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Timeout)
            }
        }
    }
}

fn uniform_driver(
    transport: Simulated,
    timeout: Duration,
) -> LoadDriver<Simulated, UniformSelector> {
    let runner = RequestRunner::new(
        transport,
        "http://localhost:8000",
        timeout,
        Arc::new(StatRecorder::new()),
    )
    .unwrap_or_else(|e| panic!("runner: {e}"));
    let selector = UniformSelector::new(default_endpoints(), Some(42))
        .unwrap_or_else(|e| panic!("selector: {e}"));
    LoadDriver::new(Arc::new(runner), Arc::new(selector))
}

#[tokio::test(start_paused = true)]
async fn five_hundred_successful_requests_at_concurrency_twenty() -> anyhow::Result<()> {
    let transport = Simulated::new(Reply::Status(200), 10, 50);
    let driver = uniform_driver(transport.clone(), Duration::from_secs(10));

    let report = driver
        .run(&LoadPlan::fixed(500, 20), std::future::pending())
        .await?;
    let snap = report.snapshot;

    anyhow::ensure!(!report.interrupted);
    anyhow::ensure!(snap.total == 500, "total {}", snap.total);
    anyhow::ensure!(snap.success == 500 && snap.failed == 0);
    anyhow::ensure!(snap.latencies.len() == 500);
    anyhow::ensure!(snap.status_histogram.get(&StatusKey::Code(200)) == Some(&500));
    anyhow::ensure!(snap.per_endpoint.values().map(|e| e.count).sum::<u64>() == 500);
    anyhow::ensure!(transport.max_in_flight() == 20);

    let summary = snap
        .latency_summary()
        .ok_or_else(|| anyhow::anyhow!("expected latency data"))?;
    for v in [summary.min, summary.p50, summary.p95, summary.p99, summary.max] {
        anyhow::ensure!((10.0..=50.0).contains(&v), "latency {v} out of range");
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_concurrency() -> anyhow::Result<()> {
    for (requests, concurrency) in [(50, 1), (97, 3), (10, 50), (400, 64)] {
        let transport = Simulated::new(Reply::Status(200), 1, 30);
        let driver = uniform_driver(transport.clone(), Duration::from_secs(10));
        let report = driver
            .run(&LoadPlan::fixed(requests, concurrency), std::future::pending())
            .await?;

        let bound = concurrency.min(requests);
        anyhow::ensure!(
            transport.max_in_flight() <= bound,
            "c={concurrency}: saw {} in flight",
            transport.max_in_flight()
        );
        anyhow::ensure!(report.snapshot.total == requests);
        anyhow::ensure!(transport.calls() == requests);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn server_errors_fill_a_single_bucket() -> anyhow::Result<()> {
    let driver = uniform_driver(Simulated::new(Reply::Status(500), 5, 15), Duration::from_secs(1));
    let snap = driver
        .run(&LoadPlan::fixed(120, 8), std::future::pending())
        .await?
        .snapshot;

    anyhow::ensure!(snap.success == 0 && snap.failed == 120);
    anyhow::ensure!(snap.status_histogram.len() == 1);
    anyhow::ensure!(snap.status_histogram.get(&StatusKey::Code(500)) == Some(&120));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_calls_are_all_timeouts() -> anyhow::Result<()> {
    let driver = uniform_driver(Simulated::new(Reply::Stall, 1, 1), Duration::from_millis(500));
    let snap = driver
        .run(&LoadPlan::fixed(40, 10), std::future::pending())
        .await?
        .snapshot;

    anyhow::ensure!(snap.total == 40 && snap.failed == 40);
    anyhow::ensure!(snap.status_histogram.len() == 1);
    anyhow::ensure!(snap.status_histogram.get(&StatusKey::Timeout) == Some(&40));
    anyhow::ensure!(snap.latencies.iter().all(|&l| l == 500.0));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_a_consistent_partial_snapshot() -> anyhow::Result<()> {
    let transport = Simulated::new(Reply::Status(200), 100, 100);
    let driver = uniform_driver(transport, Duration::from_secs(10));

    let cancel = tokio::time::sleep(Duration::from_millis(550));
    let report = driver.run(&LoadPlan::fixed(1_000, 10), cancel).await?;
    let snap = report.snapshot;

    anyhow::ensure!(report.interrupted);
    anyhow::ensure!(snap.total == 50, "total {}", snap.total);
    anyhow::ensure!(snap.total == snap.success + snap.failed);
    anyhow::ensure!(snap.status_histogram.values().sum::<u64>() == snap.total);
    anyhow::ensure!(snap.latencies.len() as u64 == snap.total);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn duration_mode_stops_claiming_at_the_deadline() -> anyhow::Result<()> {
    let transport = Simulated::new(Reply::Status(200), 100, 100);
    let driver = uniform_driver(transport, Duration::from_secs(10));

    let report = driver
        .run(&LoadPlan::timed(Duration::from_secs(1), 5), std::future::pending())
        .await?;

    anyhow::ensure!(!report.interrupted);
    let total = report.snapshot.total;
    anyhow::ensure!((45..=55).contains(&total), "total {total}");
    anyhow::ensure!(report.elapsed >= Duration::from_secs(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sequence_selector_spreads_requests_evenly() -> anyhow::Result<()> {
    let runner = RequestRunner::new(
        Simulated::new(Reply::Status(200), 1, 5),
        "http://localhost:8000/",
        Duration::from_secs(1),
        Arc::new(StatRecorder::new()),
    )?;
    let selector = SequenceSelector::new(default_endpoints())?;
    let driver = LoadDriver::new(Arc::new(runner), Arc::new(selector));

    let snap = driver
        .run(&LoadPlan::fixed(600, 4), std::future::pending())
        .await?
        .snapshot;

    anyhow::ensure!(snap.per_endpoint.len() == 6);
    for (path, stats) in &snap.per_endpoint {
        anyhow::ensure!(stats.count == 100, "{path}: {}", stats.count);
        anyhow::ensure!(stats.success_rate_pct() == Some(100.0));
    }
    Ok(())
}
