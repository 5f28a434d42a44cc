mod config;
mod wiring;

use std::error::Error;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = config::Config::from_env()?;
    let state = wiring::build_state(&config)?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "wallet server listening");

    axum::serve(listener, wiring::build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("wallet server stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet=info,api=info,wallet_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable, serving until killed");
        std::future::pending::<()>().await;
    }
}
