//! Example: Gating a slow client behind a readiness check
//!
//! This example starts a simulated cache client whose handshake takes a
//! second, polls its health the way an HTTP health endpoint would, and then
//! waits for it before serving.
//!
//! Run with `RUST_LOG=debug` to see the gate's own events.

use std::time::Duration;

use aerogate::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A cache connection that is expensive to create
struct CacheClient {
    endpoint: String,
}

#[async_trait::async_trait]
impl Liveness for CacheClient {}

async fn connect(hostname: String, port: u16) -> Result<CacheClient, BoxError> {
    // Simulate a network handshake
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(CacheClient {
        endpoint: format!("{hostname}:{port}"),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = GateConfig::new("users", "profiles")
        .with_endpoint("127.0.0.1", 3000)
        .with_ready_timeout(Duration::from_secs(5));
    let gate = BootstrapGate::from_config(&config, connect)?;

    info!(report = ?gate.health_report(), "Created gate (still connecting)");

    match gate.wait_for_ready(Duration::from_millis(200)).await {
        Err(err) if err.is_transient() => info!(%err, "Not ready yet, carrying on"),
        other => other?,
    }

    gate.wait_ready().await?;
    gate.probe_connection().await?;

    let client = gate.ready_handle(Duration::ZERO).await?;
    info!(endpoint = %client.endpoint, "Client ready");
    info!(
        report = %serde_json::to_string(&gate.health_report())?,
        "Health endpoint payload"
    );

    Ok(())
}
