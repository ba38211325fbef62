// Fundoo Notes - notes backend with labels, sharing and reminder emails
// Entry point and server setup

use clap::Parser;
use fundoo_notes::{api, app, config::Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fundoo_notes=debug,tower_http=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    let bind = settings.bind;

    tracing::info!("Starting Fundoo Notes server");

    let state = app::setup(settings).await?;
    let router = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.scheduler.shutdown().await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
