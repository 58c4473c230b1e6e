//! Push reporter for the Sensu/Influx sink
//!
//! Periodically encodes the push registry's step and writes it as a Sensu
//! metric event. Only outbound connections are made.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use super::error::{MetricsError, Result};
use super::push::{PushRegistry, SensuConfig};

/// Sensu check result carrying Influx line protocol in `output`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensuEvent {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub handlers: Vec<String>,
    pub output: String,
    pub status: u8,
}

impl SensuEvent {
    pub fn metric(name: &str, lines: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            event_type: "metric".to_string(),
            handlers: vec!["events_nano".to_string()],
            output: lines.join("\n"),
            status: 0,
        }
    }
}

/// Outbound channel for Sensu events
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send(&self, event: &SensuEvent) -> Result<()>;
}

/// Writes each event as JSON to the Sensu client socket
#[derive(Debug, Clone)]
pub struct SensuSocket {
    config: SensuConfig,
}

impl SensuSocket {
    pub fn new(config: SensuConfig) -> Self {
        Self { config }
    }

    fn timed_out(&self, address: &str) -> MetricsError {
        MetricsError::Timeout {
            address: address.to_string(),
            duration_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[async_trait]
impl EventTransport for SensuSocket {
    async fn send(&self, event: &SensuEvent) -> Result<()> {
        let address = self.config.address();
        let payload = serde_json::to_vec(event)?;
        let mut stream = timeout(self.config.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| self.timed_out(&address))??;
        timeout(self.config.timeout, async {
            stream.write_all(&payload).await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| self.timed_out(&address))??;

        debug!("SensuSocket: wrote {} bytes to {}", payload.len(), address);
        Ok(())
    }
}

/// Push-based metrics reporter
pub struct PushReporter<T> {
    registry: PushRegistry,
    transport: T,
    interval: Duration,
}

impl<T: EventTransport> PushReporter<T> {
    pub fn new(registry: PushRegistry, transport: T) -> Self {
        let interval = registry.config().step;
        Self {
            registry,
            transport,
            interval,
        }
    }

    /// Run the reporter in a loop, pushing once per step
    pub async fn run(self) {
        info!(
            "PushReporter: Starting push to {} (interval: {:?})",
            self.registry.config().sensu.address(),
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.publish().await {
                Ok(0) => debug!("PushReporter: nothing to push this step"),
                Ok(lines) => debug!("PushReporter: pushed {} lines", lines),
                Err(e) => warn!("PushReporter: Failed to push metrics: {}", e),
            }
        }
    }

    /// Push the current step; returns the number of lines sent
    pub async fn publish(&self) -> Result<usize> {
        let Some(event) = self.registry.sensu_event(Utc::now()) else {
            return Ok(0);
        };
        let lines = event.output.lines().count();
        self.transport.send(&event).await?;
        Ok(lines)
    }
}
