//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use ledger::{InMemoryTransactionStore, PostgresTransactionStore, TransactionStore};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::CompensationSweeper;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Builds state over `store`, starts the compensation sweeper and serves until shutdown.
async fn serve<S: TransactionStore + 'static>(
    config: Config,
    store: S,
    metrics_handle: PrometheusHandle,
) {
    let (state, _handles) = api::create_default_state(store, &config);
    let sweeper = CompensationSweeper::spawn(Arc::clone(&state.saga), config.sweep_interval);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    sweeper.shutdown().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Select the transaction ledger and serve
    match config.database_url.clone() {
        Some(url) => {
            tracing::info!("using PostgreSQL transaction ledger");
            let pool = sqlx::PgPool::connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresTransactionStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            serve(config, store, metrics_handle).await;
        }
        None => {
            tracing::info!("using in-memory transaction ledger");
            serve(config, InMemoryTransactionStore::new(), metrics_handle).await;
        }
    }
}
