use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_SIMPLE: &str = "/test/simple";
pub const PATH_CPU: &str = "/test/cpu";
pub const PATH_MEMORY: &str = "/test/memory";
pub const PATH_DATABASE: &str = "/test/database";
pub const PATH_CACHE: &str = "/test/cache";
pub const PATH_MIXED: &str = "/test/mixed";
pub const PATH_SLOW: &str = "/test/slow";
pub const PATH_ERROR: &str = "/test/error";
pub const PATH_DEGRADED: &str = "/test/degraded";
pub const PATH_METRICS: &str = "/metrics";

/// Paths that always answer `200` with a JSON body whose `status` is `ok`.
pub const OK_PATHS: [&str; 6] = [
    PATH_SIMPLE,
    PATH_CPU,
    PATH_MEMORY,
    PATH_DATABASE,
    PATH_CACHE,
    PATH_MIXED,
];

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    max_in_flight: Arc<AtomicU64>,
}

impl TestServerStats {
    fn enter(&self) -> InFlightGuard {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Highest number of requests the server was handling at the same time.
    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::Acquire)
    }
}

struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Serialize)]
struct TestResponse {
    status: &'static str,
    endpoint: &'static str,
}

#[derive(Debug, Deserialize)]
struct SlowQuery {
    ms: Option<u64>,
}

async fn respond(stats: &TestServerStats, endpoint: &'static str) -> (StatusCode, String) {
    let _guard = stats.enter();
    // Keep handlers busy long enough for concurrent requests to overlap.
    sleep(Duration::from_millis(2)).await;
    json_body(StatusCode::OK, "ok", endpoint)
}

fn json_body(code: StatusCode, status: &'static str, endpoint: &'static str) -> (StatusCode, String) {
    match serde_json::to_string(&TestResponse { status, endpoint }) {
        Ok(body) => (code, body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode error".to_string()),
    }
}

async fn handle_simple(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_SIMPLE).await
}

async fn handle_cpu(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_CPU).await
}

async fn handle_memory(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_MEMORY).await
}

async fn handle_database(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_DATABASE).await
}

async fn handle_cache(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_CACHE).await
}

async fn handle_mixed(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    respond(&stats, PATH_MIXED).await
}

async fn handle_slow(
    State(stats): State<TestServerStats>,
    Query(query): Query<SlowQuery>,
) -> (StatusCode, String) {
    let _guard = stats.enter();
    sleep(Duration::from_millis(query.ms.unwrap_or(200))).await;
    json_body(StatusCode::OK, "ok", PATH_SLOW)
}

async fn handle_error(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    let _guard = stats.enter();
    json_body(StatusCode::INTERNAL_SERVER_ERROR, "error", PATH_ERROR)
}

async fn handle_degraded(State(stats): State<TestServerStats>) -> (StatusCode, String) {
    let _guard = stats.enter();
    json_body(StatusCode::OK, "degraded", PATH_DEGRADED)
}

async fn handle_metrics(State(stats): State<TestServerStats>) -> String {
    let _guard = stats.enter();
    format!(
        "# TYPE laravel_app_http_requests_total counter\nlaravel_app_http_requests_total {}\n",
        stats.requests_total()
    )
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_SIMPLE, get(handle_simple))
        .route(PATH_CPU, get(handle_cpu))
        .route(PATH_MEMORY, get(handle_memory))
        .route(PATH_DATABASE, get(handle_database))
        .route(PATH_CACHE, get(handle_cache))
        .route(PATH_MIXED, get(handle_mixed))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_ERROR, get(handle_error))
        .route(PATH_DEGRADED, get(handle_degraded))
        .route(PATH_METRICS, get(handle_metrics))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();

        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
