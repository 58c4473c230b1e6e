use async_trait::async_trait;
use medlemskap_metrics::config::MetricsEnvConfig;
use medlemskap_metrics::infrastructure::observability::metrics;
use medlemskap_metrics::infrastructure::observability::{
    EventTransport, MeterRegistry, PushConfig, PushReporter, Result, SensuEvent,
    configure_push_registry,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct CapturingTransport {
    events: Arc<Mutex<Vec<SensuEvent>>>,
}

#[async_trait]
impl EventTransport for CapturingTransport {
    async fn send(&self, event: &SensuEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn prod_config() -> PushConfig {
    PushConfig::new(&MetricsEnvConfig {
        application: "medlemskap-oppslag".to_string(),
        cluster: "prod-gcp".to_string(),
        namespace: "medlemskap".to_string(),
    })
}

#[test]
fn test_publish_carries_environment_tags() {
    let meters = MeterRegistry::new();
    let push = configure_push_registry(&meters, prod_config()).unwrap();
    let transport = CapturingTransport::default();
    let reporter = PushReporter::new(push, transport.clone());

    metrics::regel_influx_counter(&meters, "1.4", "JA", "SYKEPENGER")
        .unwrap()
        .increment();

    let sent = tokio_test::block_on(reporter.publish()).unwrap();
    assert_eq!(sent, 1);

    let events = transport.events.lock().unwrap();
    let output = &events[0].output;
    assert!(output.starts_with("regel_calls_influx,application=medlemskap-oppslag,cluster=prod-gcp,"));
    assert!(output.contains("metric_type=counter,namespace=medlemskap,regelnummer=1.4,status=JA,ytelse=SYKEPENGER value=1 "));
}

#[tokio::test(start_paused = true)]
async fn test_started_reporter_pushes_every_step() {
    let meters = MeterRegistry::new();
    let push = configure_push_registry(&meters, prod_config()).unwrap();
    let transport = CapturingTransport::default();
    let api = metrics::api_counter(&meters).unwrap();

    push.start(transport.clone());

    api.increment();
    tokio::time::sleep(Duration::from_secs(11)).await;
    api.increment_by(2.0);
    tokio::time::sleep(Duration::from_secs(10)).await;

    let events = transport.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].output.contains(" value=1 "));
    assert!(events[1].output.contains(" value=2 "));
}
