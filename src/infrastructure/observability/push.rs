//! Push-based sink: every step the filtered view is encoded as Influx line
//! protocol and shipped inside a Sensu event.
//!
//! Counters and histograms are reported as the change since the previous
//! step, gauges as their current value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use prometheus::Registry;
use tokio::task::JoinHandle;
use tracing::info;

use super::error::Result;
use super::filter::MeterFilter;
use super::meter::MeterId;
use super::registry::{Child, MeterRegistry, SinkRegistry};
use super::reporter::{EventTransport, PushReporter, SensuEvent};
use crate::config::MetricsEnvConfig;

pub const DEFAULT_STEP: Duration = Duration::from_secs(10);
pub const SENSU_NAME: &str = "medlemskap-mini-events";
/// Only these meters are forwarded to the push sink
pub const PUSHED_NAME_PREFIXES: &[&str] = &["api_hit_counter", "regel_calls_influx"];

/// Where Sensu events are written
#[derive(Debug, Clone, PartialEq)]
pub struct SensuConfig {
    pub host: String,
    pub port: u16,
    /// Applied to connect and write separately
    pub timeout: Duration,
}

impl Default for SensuConfig {
    fn default() -> Self {
        Self {
            host: "sensu.nais".to_string(),
            port: 3030,
            timeout: Duration::from_secs(5),
        }
    }
}

impl SensuConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushConfig {
    pub step: Duration,
    pub sensu_name: String,
    pub name_prefixes: Vec<String>,
    pub common_tags: Vec<(String, String)>,
    pub sensu: SensuConfig,
}

impl PushConfig {
    pub fn new(env: &MetricsEnvConfig) -> Self {
        Self {
            step: DEFAULT_STEP,
            sensu_name: SENSU_NAME.to_string(),
            name_prefixes: PUSHED_NAME_PREFIXES.iter().map(|p| p.to_string()).collect(),
            common_tags: env.common_tags(),
            sensu: SensuConfig::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(&MetricsEnvConfig::from_env())
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self::new(&MetricsEnvConfig::default())
    }
}

/// Cumulative values seen at the end of the previous step
#[derive(Debug, Clone, Copy, Default)]
struct StepMark {
    value: f64,
    count: u64,
}

#[derive(Clone)]
pub struct PushRegistry {
    sink: Arc<SinkRegistry>,
    config: Arc<PushConfig>,
    marks: Arc<Mutex<HashMap<MeterId, StepMark>>>,
}

impl PushRegistry {
    /// Push registry with its name filter and common tags, not yet attached
    pub fn new(config: PushConfig) -> Result<Self> {
        let labels: HashMap<String, String> = config.common_tags.iter().cloned().collect();
        let registry = Registry::new_custom(None, Some(labels))?;
        let filters = vec![MeterFilter::deny_unless_name_starts_with(
            config.name_prefixes.iter().cloned(),
        )];
        Ok(Self {
            sink: Arc::new(SinkRegistry::new("sensu-influx", registry, filters)),
            config: Arc::new(config),
            marks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create the push registry and attach it to `meters`
    pub fn configure(meters: &MeterRegistry, config: PushConfig) -> Result<Self> {
        let push = Self::new(config)?;
        meters.add_sink(push.sink.clone())?;
        info!(
            "PushRegistry: forwarding {:?} to {} every {:?}",
            push.config.name_prefixes,
            push.config.sensu.address(),
            push.config.step
        );
        Ok(push)
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Prometheus text view of what this sink sees, common tags included
    pub fn render(&self) -> Result<String> {
        self.sink.render()
    }

    /// Spawn the periodic reporter on the current tokio runtime
    pub fn start<T>(&self, transport: T) -> JoinHandle<()>
    where
        T: EventTransport + 'static,
    {
        let reporter = PushReporter::new(self.clone(), transport);
        tokio::spawn(reporter.run())
    }

    /// Encode the current step and advance the step marks. Counter and
    /// histogram deltas returned here are not reported again.
    pub(crate) fn influx_lines(&self, timestamp: DateTime<Utc>) -> Vec<String> {
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or_default();
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lines = Vec::new();

        for (id, child) in self.sink.series() {
            let mark = marks.entry(id.clone()).or_default();
            match child {
                Child::Counter(counter) => {
                    let current = counter.get();
                    let delta = current - mark.value;
                    mark.value = current;
                    if delta > 0.0 {
                        lines.push(self.line(&id, "counter", &[("value", delta)], nanos));
                    }
                }
                Child::Gauge(gauge) => {
                    lines.push(self.line(&id, "gauge", &[("value", gauge.get() as f64)], nanos));
                }
                Child::Histogram(histogram) => {
                    let count = histogram.get_sample_count();
                    let sum = histogram.get_sample_sum();
                    let count_delta = count.saturating_sub(mark.count);
                    let sum_delta = sum - mark.value;
                    mark.count = count;
                    mark.value = sum;
                    if count_delta > 0 {
                        let mean = sum_delta / count_delta as f64;
                        lines.push(self.line(
                            &id,
                            "histogram",
                            &[
                                ("sum", sum_delta),
                                ("count", count_delta as f64),
                                ("mean", mean),
                            ],
                            nanos,
                        ));
                    }
                }
            }
        }
        lines
    }

    /// The Sensu event for the current step, or `None` when nothing changed.
    /// Consumes the step: the reporter calls this once per interval.
    pub fn sensu_event(&self, timestamp: DateTime<Utc>) -> Option<SensuEvent> {
        let lines = self.influx_lines(timestamp);
        if lines.is_empty() {
            return None;
        }
        Some(SensuEvent::metric(&self.config.sensu_name, lines))
    }

    fn line(&self, id: &MeterId, metric_type: &str, fields: &[(&str, f64)], nanos: i64) -> String {
        let mut tags: Vec<(&str, &str)> = id
            .tags()
            .iter()
            .chain(self.config.common_tags.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        tags.push(("metric_type", metric_type));
        tags.sort_by(|a, b| a.0.cmp(b.0));

        let mut line = escape_measurement(id.name());
        for (key, value) in tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&escape_tag(value));
        }
        let fields: Vec<String> = fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_tag(key), value))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&nanos.to_string());
        line
    }
}

pub fn configure_push_registry(meters: &MeterRegistry, config: PushConfig) -> Result<PushRegistry> {
    PushRegistry::configure(meters, config)
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::observability::{Counter, Gauge};
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap()
    }

    fn configured() -> (MeterRegistry, PushRegistry) {
        let meters = MeterRegistry::new();
        let push = configure_push_registry(&meters, PushConfig::default()).unwrap();
        (meters, push)
    }

    #[test]
    fn test_default_push_config() {
        let config = PushConfig::default();
        assert_eq!(config.step, Duration::from_secs(10));
        assert_eq!(config.sensu_name, "medlemskap-mini-events");
        assert_eq!(config.name_prefixes, vec!["api_hit_counter", "regel_calls_influx"]);
        assert_eq!(config.sensu.address(), "sensu.nais:3030");
    }

    #[test]
    fn test_counter_line_carries_common_tags() {
        let (meters, push) = configured();
        let counter = Counter::builder("api_hit_counter").register(&meters).unwrap();
        counter.increment();

        let lines = push.influx_lines(timestamp());
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "api_hit_counter,application=medlemskap-mini,cluster=dev-gcp,metric_type=counter,namespace=default value=1 1768039200000000000"
        );
    }

    #[test]
    fn test_counter_reports_delta_per_step() {
        let (meters, push) = configured();
        let counter = Counter::builder("regel_calls_influx")
            .tag("regelnummer", "1.4")
            .tag("status", "JA")
            .tag("ytelse", "SYKEPENGER")
            .register(&meters)
            .unwrap();

        counter.increment_by(3.0);
        let first = push.influx_lines(timestamp());
        assert!(first[0].contains(" value=3 "));

        assert!(push.influx_lines(timestamp()).is_empty());

        counter.increment();
        let third = push.influx_lines(timestamp());
        assert!(third[0].contains(" value=1 "));
    }

    #[test]
    fn test_filtered_meters_are_not_pushed() {
        let (meters, push) = configured();
        Counter::builder("medl_counter")
            .register(&meters)
            .unwrap()
            .increment();
        assert!(push.influx_lines(timestamp()).is_empty());
        assert!(push.sensu_event(timestamp()).is_none());
    }

    #[test]
    fn test_gauge_reports_current_value() {
        let meters = MeterRegistry::new();
        let mut config = PushConfig::default();
        config.name_prefixes.push("health_check".to_string());
        let push = configure_push_registry(&meters, config).unwrap();

        let gauge = Gauge::builder("health_check_status").register(&meters).unwrap();
        gauge.set(1);
        let lines = push.influx_lines(timestamp());
        assert!(lines[0].contains("metric_type=gauge"));
        assert!(lines[0].contains(" value=1 "));
        assert_eq!(push.influx_lines(timestamp()).len(), 1);
    }

    #[test]
    fn test_tag_values_are_escaped() {
        let (meters, push) = configured();
        Counter::builder("api_hit_counter_uavklart")
            .tag("regel", "REGEL_1_4 - a,b=c")
            .register(&meters)
            .unwrap()
            .increment();
        let lines = push.influx_lines(timestamp());
        assert!(lines[0].contains("regel=REGEL_1_4\\ -\\ a\\,b\\=c"));
    }

    #[test]
    fn test_render_includes_common_labels() {
        let (meters, push) = configured();
        Counter::builder("api_hit_counter")
            .description("Registers a counter for each hit to the api")
            .register(&meters)
            .unwrap()
            .increment();
        let output = push.render().unwrap();
        assert!(output.contains("application=\"medlemskap-mini\""));
        assert!(output.contains("cluster=\"dev-gcp\""));
        assert!(output.contains("namespace=\"default\""));
    }
}
