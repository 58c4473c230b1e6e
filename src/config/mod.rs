//! Configuration module for medlemskap-metrics.
//!
//! Configuration is loaded from environment variables, one struct per concern.

mod metrics_config;

pub use metrics_config::{APP_NAME_VAR, CLUSTER_NAME_VAR, MetricsEnvConfig, NAMESPACE_VAR};
