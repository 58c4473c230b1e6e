//! medlemskap-metrics server - headless metrics bootstrap
//!
//! Configures the pull and push registries, starts the Sensu push reporter
//! and keeps the process alive until Ctrl+C.
//!
//! # Usage
//! ```sh
//! NAIS_APP_NAME=medlemskap-oppslag cargo run --bin server
//! ```
//!
//! # Environment Variables
//! - `NAIS_APP_NAME` - `application` tag on pushed metrics (default: medlemskap-mini)
//! - `NAIS_CLUSTER_NAME` - `cluster` tag (default: dev-gcp)
//! - `NAIS_NAMESPACE` - `namespace` tag (default: default)

use anyhow::Result;
use medlemskap_metrics::infrastructure::observability::{
    MeterRegistry, PushConfig, SensuSocket, configure_pull_registry, configure_push_registry,
    metrics,
};
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!(
        "medlemskap-metrics {} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let meters = MeterRegistry::new();
    let pull = configure_pull_registry(&meters)?;

    let push_config = PushConfig::from_env();
    info!(
        "Push tags: {:?}, sink: {}",
        push_config.common_tags, push_config.sensu_name
    );
    let transport = SensuSocket::new(push_config.sensu.clone());
    let push = configure_push_registry(&meters, push_config)?;
    push.start(transport);

    let health = metrics::total_gauge(&meters)?;
    health.set(0);
    metrics::api_counter(&meters)?;

    info!("Server running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Final exposition:\n{}", pull.render()?);

    Ok(())
}
