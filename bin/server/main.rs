//! Design Challenge Server
//!
//! Runs the design evaluation pipeline as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use design_challenge::api::{self, ApiState};
use design_challenge::config::{ChallengeConfig, ExportConfig, TelemetryConfig};
use design_challenge::queue::{JobQueue, MemoryQueue, PgQueue};
use design_challenge::share::ShareGateway;
use design_challenge::storage::memory::MemoryStore;
use design_challenge::storage::pg::PgStorage;
use design_challenge::storage::{EvaluationStore, TelemetryStore};
use design_challenge::{Orchestrator, TelemetrySink};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "design-challenge-server")]
#[command(about = "Design Review Challenge HTTP Server")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8080", env = "CHALLENGE_PORT")]
    port: u16,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "CHALLENGE_HOST")]
    host: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Use the in-memory store (local development; seeds a demo project)
    #[arg(long, default_value = "false")]
    memory: bool,

    /// Request-trace sampling rate in [0,1]
    #[arg(long, default_value = "1.0", env = "TELEMETRY_SAMPLE_RATE")]
    sample_rate: f64,

    /// Shared secret for worker completion callbacks
    #[arg(long, default_value = "", env = "WORKER_TOKEN")]
    worker_token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("design_challenge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = ChallengeConfig {
        host: args.host.clone(),
        port: args.port,
        database_url: args.database_url.clone(),
        telemetry: TelemetryConfig {
            sample_rate: args.sample_rate,
            ..TelemetryConfig::default()
        },
        worker_token: args.worker_token.clone(),
        export: ExportConfig::default(),
    };

    info!("Starting Design Challenge Server");
    info!("  Listening on: {}:{}", config.host, config.port);

    // The queue client is constructed here and owned by the orchestrator
    // for the lifetime of the server; it goes away with everything else
    // when serve() returns.
    let (store, telemetry_store, queue): (
        Arc<dyn EvaluationStore>,
        Arc<dyn TelemetryStore>,
        Arc<dyn JobQueue>,
    ) = match (&config.database_url, args.memory) {
        (Some(url), false) => {
            let pg = Arc::new(PgStorage::new(url).await?);
            let queue = Arc::new(PgQueue::new(pg.pool()));
            info!("  Storage: postgres");
            (pg.clone(), pg, queue)
        }
        _ => {
            let memory = Arc::new(MemoryStore::new());
            memory.insert_project("demo-project", "demo-user", "demo project");
            memory.insert_version("demo-version", "demo-project", "v1");
            info!("  Storage: in-memory (demo project seeded)");
            (memory.clone(), memory, Arc::new(MemoryQueue::new()))
        }
    };

    let telemetry = TelemetrySink::new(telemetry_store, &config.telemetry);
    let orchestrator = Orchestrator::new(store.clone(), queue, telemetry.clone());
    let gateway = ShareGateway::new(store, config.export.clone());

    let state = Arc::new(ApiState {
        orchestrator,
        gateway,
        telemetry,
        config: config.clone(),
    });

    let app = api::router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Design Challenge Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
