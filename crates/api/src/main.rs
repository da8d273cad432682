use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use stockroom_api::server;
use stockroom_api::service::{SERVICE_NAME, SERVICE_VERSION, StockService};
use stockroom_infra::config::Settings;
use stockroom_infra::event_bus::NatsEventBus;
use stockroom_infra::schema::SchemaRegistry;
use stockroom_infra::store::PostgresInventoryStore;
use stockroom_observability::Telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockroom_observability::init();

    let settings = Settings::parse();
    settings.validate()?;

    let telemetry = Telemetry::new(SERVICE_NAME, SERVICE_VERSION);

    let schemas = SchemaRegistry::load_dir(&settings.schema_dir)
        .with_context(|| format!("loading schemas from {}", settings.schema_dir.display()))?;

    let store = PostgresInventoryStore::connect(&settings.postgres, settings.pool_config())
        .await
        .context("connecting to postgres")?;

    let client = connect_nats(&settings).await?;
    let bus = NatsEventBus::new(client.clone());

    let service = Arc::new(StockService::new(store.clone(), bus, Arc::new(schemas), telemetry));

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    server::serve(client.clone(), service, &settings.queue_group, shutdown).await?;

    if let Err(err) = client.flush().await {
        tracing::warn!(error = %err, "failed to flush NATS client");
    }
    store.close().await;
    tracing::info!("stock service stopped");
    Ok(())
}

async fn connect_nats(settings: &Settings) -> anyhow::Result<async_nats::Client> {
    let options = match &settings.credentials {
        Some(path) => async_nats::ConnectOptions::with_credentials_file(path)
            .await
            .with_context(|| format!("reading NATS credentials {}", path.display()))?,
        None => async_nats::ConnectOptions::new(),
    };

    let client = options
        .name(SERVICE_NAME)
        .connect(settings.nats_url.as_str())
        .await
        .with_context(|| format!("connecting to NATS at {}", settings.nats_url))?;

    tracing::info!(url = %settings.nats_url, "connected to NATS");
    Ok(client)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
