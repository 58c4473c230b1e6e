//! Meter identities, descriptors and the handles handed out to callers.
//!
//! A handle is a composite: it owns one backend child per sink that accepted
//! the meter, and forwards every mutation to all of them. Sinks attached after
//! a handle was created are added to it in place, so handles never go stale.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::error::Result;
use super::latency_tracker::LatencyGuard;
use super::registry::MeterRegistry;

/// Meter name plus its label set, ordered by label key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterId {
    name: String,
    tags: Vec<(String, String)>,
}

impl MeterId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
        }
    }

    /// Add a label, replacing any existing value for the same key
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.tags.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(pos) => self.tags[pos].1 = value,
            Err(pos) => self.tags.insert(pos, (key, value)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn tag_keys(&self) -> Vec<&str> {
        self.tags.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn tag_values(&self) -> Vec<&str> {
        self.tags.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: self.tags.clone(),
        }
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "{{{}}}", tags.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterKind {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterKind::Counter => write!(f, "counter"),
            MeterKind::Gauge => write!(f, "gauge"),
            MeterKind::Histogram => write!(f, "histogram"),
        }
    }
}

/// Everything a sink needs to create its backend series for a meter
#[derive(Debug, Clone)]
pub struct MeterDescriptor {
    pub id: MeterId,
    pub kind: MeterKind,
    pub description: String,
    /// Upper bounds for histogram buckets; ignored for other kinds
    pub buckets: Vec<f64>,
}

impl MeterDescriptor {
    pub fn new(id: MeterId, kind: MeterKind) -> Self {
        Self {
            id,
            kind,
            description: String::new(),
            buckets: Vec::new(),
        }
    }

    /// Help text for the series exposed as `exposed`. Prometheus rejects
    /// empty help, so an empty description falls back to the exposed name.
    pub fn help<'a>(&'a self, exposed: &'a MeterId) -> &'a str {
        if self.description.is_empty() {
            exposed.name()
        } else {
            &self.description
        }
    }
}

/// Handle types that can be registered through a [`MeterBuilder`]
pub trait Meter: Sized {
    const KIND: MeterKind;

    fn register(registry: &MeterRegistry, descriptor: MeterDescriptor) -> Result<Self>;
}

/// Fluent description of a meter, finished by [`MeterBuilder::register`]
#[derive(Debug, Clone)]
pub struct MeterBuilder<M> {
    descriptor: MeterDescriptor,
    _meter: PhantomData<M>,
}

impl<M: Meter> MeterBuilder<M> {
    fn new(name: &str) -> Self {
        Self {
            descriptor: MeterDescriptor::new(MeterId::new(name), M::KIND),
            _meter: PhantomData,
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.descriptor.id = self.descriptor.id.with_tag(key, value);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.descriptor.description = description.to_string();
        self
    }

    pub fn register(self, registry: &MeterRegistry) -> Result<M> {
        M::register(registry, self.descriptor)
    }
}

impl MeterBuilder<DistributionSummary> {
    pub fn buckets(mut self, buckets: &[f64]) -> Self {
        self.descriptor.buckets = buckets.to_vec();
        self
    }
}

impl MeterBuilder<Timer> {
    /// Bucket bounds in seconds
    pub fn buckets(mut self, buckets: &[f64]) -> Self {
        self.descriptor.buckets = buckets.to_vec();
        self
    }
}

/// Children of one composite handle, one per accepting sink
pub(crate) struct MeterCell<T> {
    id: MeterId,
    children: RwLock<Vec<T>>,
}

impl<T: Clone> MeterCell<T> {
    fn new(id: MeterId) -> Self {
        Self {
            id,
            children: RwLock::new(Vec::new()),
        }
    }

    fn attach(&self, child: T) {
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }

    fn each(&self, f: impl Fn(&T)) {
        let children = self.children.read().unwrap_or_else(PoisonError::into_inner);
        children.iter().for_each(f);
    }

    fn first(&self) -> Option<T> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    fn len(&self) -> usize {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Monotonic accumulator
#[derive(Clone)]
pub struct Counter {
    cell: Arc<MeterCell<prometheus::Counter>>,
}

impl Counter {
    pub fn builder(name: &str) -> MeterBuilder<Counter> {
        MeterBuilder::new(name)
    }

    pub(crate) fn new(id: MeterId) -> Self {
        Self {
            cell: Arc::new(MeterCell::new(id)),
        }
    }

    pub(crate) fn attach(&self, child: prometheus::Counter) {
        self.cell.attach(child);
    }

    pub fn id(&self) -> &MeterId {
        &self.cell.id
    }

    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// Negative or non-finite amounts are ignored; counters never go down.
    pub fn increment_by(&self, amount: f64) {
        if !amount.is_finite() || amount < 0.0 {
            return;
        }
        self.cell.each(|child| child.inc_by(amount));
    }

    /// Accumulated count as seen by the first attached sink
    pub fn count(&self) -> f64 {
        self.cell.first().map(|c| c.get()).unwrap_or(0.0)
    }

    /// Number of sinks this counter forwards to
    pub fn sink_count(&self) -> usize {
        self.cell.len()
    }

    /// True when both handles feed the same underlying series
    pub fn same_series(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Meter for Counter {
    const KIND: MeterKind = MeterKind::Counter;

    fn register(registry: &MeterRegistry, descriptor: MeterDescriptor) -> Result<Self> {
        registry.register_counter(descriptor)
    }
}

/// Externally set integer value
#[derive(Clone)]
pub struct Gauge {
    cell: Arc<MeterCell<prometheus::IntGauge>>,
    value: Arc<AtomicI64>,
}

impl Gauge {
    pub fn builder(name: &str) -> MeterBuilder<Gauge> {
        MeterBuilder::new(name)
    }

    pub(crate) fn new(id: MeterId) -> Self {
        Self {
            cell: Arc::new(MeterCell::new(id)),
            value: Arc::new(AtomicI64::new(0)),
        }
    }

    /// New children start at the gauge's current value
    pub(crate) fn attach(&self, child: prometheus::IntGauge) {
        let mut children = self
            .cell
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        child.set(self.value.load(Ordering::SeqCst));
        children.push(child);
    }

    pub fn id(&self) -> &MeterId {
        &self.cell.id
    }

    pub fn set(&self, value: i64) {
        let children = self
            .cell
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.value.store(value, Ordering::SeqCst);
        for child in children.iter() {
            child.set(value);
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

impl Meter for Gauge {
    const KIND: MeterKind = MeterKind::Gauge;

    fn register(registry: &MeterRegistry, descriptor: MeterDescriptor) -> Result<Self> {
        registry.register_gauge(descriptor)
    }
}

/// Records arbitrary values into a bucketed histogram
#[derive(Clone)]
pub struct DistributionSummary {
    cell: Arc<MeterCell<prometheus::Histogram>>,
}

impl DistributionSummary {
    pub fn builder(name: &str) -> MeterBuilder<DistributionSummary> {
        MeterBuilder::new(name)
    }

    pub(crate) fn new(id: MeterId) -> Self {
        Self {
            cell: Arc::new(MeterCell::new(id)),
        }
    }

    pub(crate) fn attach(&self, child: prometheus::Histogram) {
        self.cell.attach(child);
    }

    pub fn id(&self) -> &MeterId {
        &self.cell.id
    }

    pub fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.cell.each(|child| child.observe(value));
    }

    pub fn count(&self) -> u64 {
        self.cell.first().map(|h| h.get_sample_count()).unwrap_or(0)
    }

    pub fn total(&self) -> f64 {
        self.cell.first().map(|h| h.get_sample_sum()).unwrap_or(0.0)
    }
}

impl Meter for DistributionSummary {
    const KIND: MeterKind = MeterKind::Histogram;

    fn register(registry: &MeterRegistry, descriptor: MeterDescriptor) -> Result<Self> {
        registry.register_histogram(descriptor)
    }
}

/// Histogram of durations, recorded in seconds
#[derive(Debug, Clone)]
pub struct Timer {
    summary: DistributionSummary,
}

impl Timer {
    pub fn builder(name: &str) -> MeterBuilder<Timer> {
        MeterBuilder::new(name)
    }

    pub fn id(&self) -> &MeterId {
        self.summary.id()
    }

    pub fn record(&self, elapsed: Duration) {
        self.summary.record(elapsed.as_secs_f64());
    }

    /// Start timing; the elapsed time is recorded when the guard drops
    pub fn start(&self) -> LatencyGuard {
        LatencyGuard::new(self.clone())
    }

    pub fn count(&self) -> u64 {
        self.summary.count()
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_secs_f64(self.summary.total().max(0.0))
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter").field("id", self.id()).finish()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("id", self.id())
            .field("value", &self.get())
            .finish()
    }
}

impl fmt::Debug for DistributionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionSummary")
            .field("id", self.id())
            .finish()
    }
}

impl Meter for Timer {
    const KIND: MeterKind = MeterKind::Histogram;

    fn register(registry: &MeterRegistry, descriptor: MeterDescriptor) -> Result<Self> {
        let summary = registry.register_histogram(descriptor)?;
        Ok(Self { summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_id_orders_tags_by_key() {
        let a = MeterId::new("m").with_tag("b", "2").with_tag("a", "1");
        let b = MeterId::new("m").with_tag("a", "1").with_tag("b", "2");
        assert_eq!(a, b);
        assert_eq!(a.tag_keys(), vec!["a", "b"]);
        assert_eq!(a.to_string(), "m{a=1,b=2}");
    }

    #[test]
    fn test_meter_id_replaces_duplicate_key() {
        let id = MeterId::new("m").with_tag("a", "1").with_tag("a", "2");
        assert_eq!(id.tags().len(), 1);
        assert_eq!(id.tag("a"), Some("2"));
    }

    #[test]
    fn test_empty_description_falls_back_to_name() {
        let descriptor = MeterDescriptor::new(MeterId::new("antall_dager"), MeterKind::Histogram);
        assert_eq!(descriptor.help(&descriptor.id), "antall_dager");

        let renamed = descriptor.id.renamed("dager");
        assert_eq!(descriptor.help(&renamed), "dager");
    }

    #[test]
    fn test_description_wins_over_name() {
        let mut descriptor = MeterDescriptor::new(MeterId::new("medl_counter"), MeterKind::Counter);
        descriptor.description = "Kall mot MEDL".to_string();
        assert_eq!(descriptor.help(&descriptor.id.renamed("x")), "Kall mot MEDL");
    }

    #[test]
    fn test_detached_handles_are_noops() {
        let counter = Counter::new(MeterId::new("c"));
        counter.increment();
        assert_eq!(counter.count(), 0.0);
        assert_eq!(counter.sink_count(), 0);

        let gauge = Gauge::new(MeterId::new("g"));
        gauge.set(1);
        assert_eq!(gauge.get(), 1);
    }

    #[test]
    fn test_counter_ignores_negative_amounts() {
        let counter = Counter::new(MeterId::new("c"));
        counter.attach(prometheus::Counter::new("c", "help").unwrap());
        counter.increment_by(2.0);
        counter.increment_by(-1.0);
        counter.increment_by(f64::NAN);
        assert_eq!(counter.count(), 2.0);
    }

    #[test]
    fn test_gauge_child_attached_late_gets_current_value() {
        let gauge = Gauge::new(MeterId::new("g"));
        gauge.set(1);
        let child = prometheus::IntGauge::new("g", "help").unwrap();
        gauge.attach(child.clone());
        assert_eq!(child.get(), 1);
        gauge.set(0);
        assert_eq!(child.get(), 0);
    }
}
