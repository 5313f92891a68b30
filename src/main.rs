use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use ringo_chat::infrastructure::llm::create_completion_client;
use ringo_chat::infrastructure::observability::{TracingConfig, init_tracing};
use ringo_chat::infrastructure::storage::LocalAttachmentStore;
use ringo_chat::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    let mut tracing_config = TracingConfig::default();
    tracing_config.environment = environment.to_string();
    tracing_config.json_format |= environment.prefers_json_logs();
    init_tracing(&tracing_config)?;

    let completion_client = Arc::new(
        create_completion_client(&settings.llm).context("Failed to create completion client")?,
    );
    let attachment_store = Arc::new(
        LocalAttachmentStore::new(PathBuf::from(&settings.uploads.dir))
            .context("Failed to open uploads directory")?
            .with_size_limit(settings.uploads.max_file_size_bytes() as u64),
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    tracing::info!(
        environment = %environment,
        provider = ?settings.llm.provider,
        model = %settings.llm.chat_model,
        uploads = %settings.uploads.dir,
        "Starting chat server"
    );

    let router = create_router(AppState::new(completion_client, attachment_store, settings));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
