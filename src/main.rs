use anyhow::{anyhow, Context, Result};
use entity_widget::client::HttpEntityClient;
use entity_widget::config::{load_config, WidgetServiceConfig};
use entity_widget::host::{LogRenderSink, WidgetHost};
use entity_widget::store::SqliteWidgetStore;
use entity_widget::{EntitySnapshot, Resolver};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entity_widget=info".into()),
        )
        .init();

    info!("Entity widget host starting...");

    let config = match std::env::var("ENTITY_WIDGET_CONFIG") {
        Ok(path) => load_config(&path)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => WidgetServiceConfig::default(),
    }
    .with_env_overrides();

    info!(
        db_path = %config.store.db_path.display(),
        base_url = %config.client.base_url,
        "Configuration loaded"
    );
    if config.client.access_token.is_empty() {
        warn!("No access token configured (set ENTITY_WIDGET_TOKEN)");
    }

    let store = Arc::new(
        SqliteWidgetStore::new(&config.store.db_path)
            .context("Failed to initialize widget store")?,
    );
    let client = Arc::new(HttpEntityClient::new(
        config.client.base_url.clone(),
        config.client.access_token.clone(),
        Duration::from_secs(config.client.request_timeout_seconds),
    )?);
    let resolver = Resolver::new(client, store.clone());
    let host = Arc::new(WidgetHost::new(store, resolver, Arc::new(LogRenderSink)));

    // Initial refresh of every configured instance
    let handles = host.on_refresh_all()?;
    info!(instances = handles.len(), "Refreshing widgets");
    futures::future::join_all(handles).await;

    // Pushed snapshots arrive as JSON lines on stdin until EOF
    let (push_tx, push_rx) = broadcast::channel(config.push.channel_capacity);
    let listener = tokio::spawn(Arc::clone(&host).run_push_listener(push_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read push input")?
    {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EntitySnapshot>(&line) {
            Ok(snapshot) => {
                if push_tx.send(snapshot).is_err() {
                    warn!("Push listener gone, dropping snapshot");
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed push line"),
        }
    }

    drop(push_tx);
    listener.await.context("Push listener task failed")?;

    info!("Entity widget host stopped");
    Ok(())
}
