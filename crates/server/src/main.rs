// egress-server main.rs
// HTTP API and background poll loop for the outbound connection trust
// monitor.

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};

use egress_server::api::{events_api_router, ApiState};
use egress_server::config::ServerConfig;
use egress_server::policy_cache::PolicyCache;
use egress_server::scheduler::PollScheduler;
use egress_server::store::EventStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "egress_server=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = ServerConfig::from_env();
    if let Some(port) = args
        .iter()
        .position(|a| a == "--port" || a == "-p")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
    {
        config.port = port;
    }

    tracing::info!("trust policy: {:?} (refresh {:?})", config.policy_path, config.policy_refresh);
    tracing::info!("store capacity: {} events per source", config.store_capacity);

    let store = Arc::new(EventStore::new(config.store_capacity));
    let policy = Arc::new(PolicyCache::new(
        config.policy_path.clone(),
        config.policy_refresh,
    ));

    // Local sampling runs on its own task, independent of request serving.
    let scheduler = Arc::new(PollScheduler::new());
    scheduler.start(Arc::clone(&store), config.poll_interval);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = ApiState { store, policy };
    let app = events_api_router(state).layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("egress-server listening at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    scheduler.shutdown().await;
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");
    tracing::info!("Shutting down...");
}
