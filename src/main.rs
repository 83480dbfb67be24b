use std::future::IntoFuture;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;

use htmx_company_board::config::{Cli, Settings};
use htmx_company_board::server::{create_app, AppState};
use htmx_company_board::shutdown::{shutdown_signal, SERVER_SHUTDOWN_TIMEOUT};
use htmx_company_board::telemetry::{init_tracing, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing(LogFormat::from_env());

    // Load configuration
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    tracing::info!(
        data_file = %settings.app.data_file,
        simulated_delay_ms = settings.app.simulated_delay_ms,
        buffer_capacity = settings.notifications.buffer_capacity,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings.clone())?;
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .into_future();
    let mut server_handle = tokio::spawn(server);

    tokio::select! {
        result = &mut server_handle => {
            // Server stopped on its own
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Application stopping");
    let _ = stop_tx.send(true);

    // Open WebSocket subscriptions keep the server alive; bound the wait
    match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, &mut server_handle).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(
                timeout_secs = SERVER_SHUTDOWN_TIMEOUT.as_secs(),
                "Graceful shutdown timed out, dropping remaining connections"
            );
            server_handle.abort();
        }
    }

    tracing::info!("Application stopped");
    Ok(())
}
