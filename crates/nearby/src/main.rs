use anyhow::Result;
use nearby::logging::init_logging;
use nearby::{InMemoryProvider, NearbyConfig, NearbyPlugin, ProviderCall};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// Runs one session against the loopback provider, which hears its own
/// publications.
#[tokio::main]
async fn main() -> Result<()> {
    let config = NearbyConfig::from_env()?;
    init_logging(config.log_format)?;
    tracing::info!("Starting Nearby loopback session");

    let provider = Arc::new(InMemoryProvider::new());
    let plugin = NearbyPlugin::new(provider.clone(), config);
    let mut notifications = plugin.notifications();

    let initialized = plugin.call("initialize", json!({})).await?;
    tracing::info!("Initialized: {}", initialized);

    plugin.call("subscribe", json!({})).await?;
    let published = plugin
        .call(
            "publish",
            json!({ "message": { "content": "aGVsbG8gbmVhcmJ5", "type": "demo" } }),
        )
        .await?;
    tracing::info!("Published: {}", published);

    for call in provider.calls() {
        if let ProviderCall::Publish { message, .. } = call {
            provider.deliver_found(message);
        }
    }

    let notification = timeout(Duration::from_secs(1), notifications.recv()).await??;
    println!("{}", serde_json::to_string(&notification)?);

    let status = plugin.call("status", json!({})).await?;
    println!("{}", status);

    plugin.call("reset", json!({})).await?;
    tracing::info!("Session reset");
    Ok(())
}
