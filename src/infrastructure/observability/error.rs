use thiserror::Error;

use super::meter::MeterKind;

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Errors raised while registering meters or shipping them to a sink
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics backend rejected meter: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Meter {name} is already registered as a {existing}, cannot register it as a {requested}")]
    KindConflict {
        name: String,
        existing: MeterKind,
        requested: MeterKind,
    },

    #[error("Meter {name} is already registered with labels {existing:?}, got {requested:?}")]
    LabelConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    #[error("Push transport failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Push to {address} timed out after {duration_ms}ms")]
    Timeout { address: String, duration_ms: u64 },

    #[error("Failed to serialize push event: {0}")]
    Serialization(#[from] serde_json::Error),
}
