//! Pull-based exposition: a prometheus registry rendered on demand by
//! whatever serves the `/metrics` endpoint.

use std::sync::Arc;

use prometheus::{Encoder, Registry, TextEncoder};

use super::error::Result;
use super::filter::MeterFilter;
use super::registry::{MeterRegistry, SinkRegistry};

#[derive(Clone)]
pub struct PullRegistry {
    sink: Arc<SinkRegistry>,
}

impl PullRegistry {
    /// Prometheus registry with the standard rename filter, not yet attached
    pub fn new() -> Self {
        Self::with_filters(vec![MeterFilter::prometheus_rename()])
    }

    pub fn with_filters(filters: Vec<MeterFilter>) -> Self {
        Self {
            sink: Arc::new(SinkRegistry::new("prometheus", Registry::new(), filters)),
        }
    }

    /// Create the pull registry and attach it to `meters`
    pub fn configure(meters: &MeterRegistry) -> Result<Self> {
        let pull = Self::new();
        meters.add_sink(pull.sink.clone())?;
        Ok(pull)
    }

    /// The backing registry, for exporters that want to gather it themselves
    pub fn registry(&self) -> &Registry {
        self.sink.registry()
    }

    /// Render all accepted metrics in Prometheus text format
    pub fn render(&self) -> Result<String> {
        self.sink.render()
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl Default for PullRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn configure_pull_registry(meters: &MeterRegistry) -> Result<PullRegistry> {
    PullRegistry::configure(meters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::observability::Counter;

    #[test]
    fn test_pull_registry_renders_registered_counter() {
        let meters = MeterRegistry::new();
        let pull = configure_pull_registry(&meters).expect("Failed to configure pull registry");

        let counter = Counter::builder("ytelse_total")
            .tag("ytelse", "SYKEPENGER")
            .description("counter for ytelser")
            .register(&meters)
            .unwrap();
        counter.increment();

        let output = pull.render().unwrap();
        assert!(output.contains("# HELP ytelse_total counter for ytelser"));
        assert!(output.contains("ytelse_total{ytelse=\"SYKEPENGER\"} 1"));
    }

    #[test]
    fn test_undescribed_meter_is_renamed_in_help_too() {
        let meters = MeterRegistry::new();
        let pull = configure_pull_registry(&meters).unwrap();
        Counter::builder("process_files_open")
            .register(&meters)
            .unwrap()
            .increment();

        let output = pull.render().unwrap();
        assert!(output.contains("# HELP process_open_fds process_open_fds"));
        assert!(output.contains("process_open_fds 1"));
        assert!(!output.contains("process_files_open"));
    }

    #[test]
    fn test_configuring_twice_attaches_two_sinks() {
        let meters = MeterRegistry::new();
        configure_pull_registry(&meters).unwrap();
        configure_pull_registry(&meters).unwrap();
        assert_eq!(meters.sink_count(), 2);

        let counter = Counter::builder("medl_counter").register(&meters).unwrap();
        assert_eq!(counter.sink_count(), 2);
    }

    #[test]
    fn test_content_type_is_prometheus_text() {
        assert!(PullRegistry::new().content_type().starts_with("text/plain"));
    }
}
