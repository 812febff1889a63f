use ironrelay::core::AppState;
use ironrelay::ws::Gateway;
use ironrelay::{create_router, Config};
use sqlx::mysql::MySqlPoolOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    config.print_info();

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Contesto di shutdown condiviso da gateway, event loop e worker.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = SocketAddr::new(config.server_host.parse()?, config.server_port);
    let (state, push_rx) = AppState::new(pool, config);

    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);
    state.attach_gateway(gateway);

    let app = create_router(state);

    info!(%addr, "server listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    Ok(())
}

/// Attende SIGINT/SIGTERM e propaga la cancellazione a tutti i loop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
