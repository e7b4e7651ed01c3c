use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use sirama_queue_service::announcer::{
    create_external_sink, AnnouncementPublisher, AnnouncementSink, BroadcastSink,
};
use sirama_queue_service::config::Settings;
use sirama_queue_service::postgres::PostgresPool;
use sirama_queue_service::server::{create_app, AppState};
use sirama_queue_service::store::create_queue_store;
use sirama_queue_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel, &settings.logging)?;
    tracing::info!("Configuration loaded");

    // PostgreSQL pool (only when the store needs it)
    let postgres_pool = if settings.store.backend == "postgres" {
        Some(PostgresPool::new(&settings.database).await?)
    } else {
        None
    };

    let store = create_queue_store(&settings.store, postgres_pool.as_ref()).await?;

    // Announcement sinks: SSE broadcast plus the configured external sink
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let broadcast_sink = BroadcastSink::new(settings.announcer.broadcast_capacity);
    let mut sinks: Vec<Arc<dyn AnnouncementSink>> = vec![Arc::new(broadcast_sink.clone())];
    if let Some(external) = create_external_sink(&settings.announcer)? {
        sinks.push(external);
    }
    let (publisher, publisher_handle) = AnnouncementPublisher::spawn(
        sinks,
        settings.announcer.queue_capacity,
        shutdown_tx.subscribe(),
    );

    // Create application state
    let state = AppState::new(
        settings.clone(),
        store,
        publisher,
        broadcast_sink,
        postgres_pool.clone(),
    );
    tracing::info!("Application state initialized");

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for pending announcements to be delivered...");
    if let Err(e) = publisher_handle.await {
        tracing::error!(error = %e, "Announcement publisher task failed");
    }

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
