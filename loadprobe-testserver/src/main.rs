use std::net::SocketAddr;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;

/// Stand-in for the target application: serves the `/test/*` and `/metrics` routes.
#[derive(Debug, Parser)]
#[command(name = "loadprobe-testserver", version)]
struct Args {
    /// Address to listen on. Port 0 picks a free port.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    let addr = listener.local_addr()?;

    let stats = loadprobe_testserver::TestServerStats::default();
    let app = loadprobe_testserver::router(stats.clone());

    // Scripts wait for this line before starting a run.
    println!("BASE_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    eprintln!(
        "served {} requests (max {} in flight)",
        stats.requests_total(),
        stats.max_in_flight()
    );
    Ok(())
}
