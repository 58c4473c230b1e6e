//! Composite meter registry and the per-sink backend registries behind it.
//!
//! `MeterRegistry` is the single aggregation point callers register through.
//! It owns the get-or-create table of handles; each attached `SinkRegistry`
//! owns its own prometheus registry and creates the backend series for the
//! meters its filters accept.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tracing::{debug, info};

use super::error::{MetricsError, Result};
use super::filter::{self, MeterFilter};
use super::meter::{Counter, DistributionSummary, Gauge, MeterDescriptor, MeterId, MeterKind};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle as stored in the registry table
#[derive(Clone)]
enum Handle {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(DistributionSummary),
}

impl Handle {
    fn id(&self) -> &MeterId {
        match self {
            Handle::Counter(c) => c.id(),
            Handle::Gauge(g) => g.id(),
            Handle::Histogram(h) => h.id(),
        }
    }

    fn kind(&self) -> MeterKind {
        match self {
            Handle::Counter(_) => MeterKind::Counter,
            Handle::Gauge(_) => MeterKind::Gauge,
            Handle::Histogram(_) => MeterKind::Histogram,
        }
    }

    fn conflict(&self, requested: MeterKind) -> MetricsError {
        MetricsError::KindConflict {
            name: self.id().name().to_string(),
            existing: self.kind(),
            requested,
        }
    }
}

struct RegisteredMeter {
    descriptor: MeterDescriptor,
    handle: Handle,
}

impl RegisteredMeter {
    /// Backend series in `sink`, without touching the handle yet
    fn resolve(&self, sink: &SinkRegistry) -> Result<Option<Child>> {
        sink.child(&self.descriptor)
    }

    fn bind(&self, child: Child) {
        match (&self.handle, child) {
            (Handle::Counter(c), Child::Counter(child)) => c.attach(child),
            (Handle::Gauge(g), Child::Gauge(child)) => g.attach(child),
            (Handle::Histogram(h), Child::Histogram(child)) => h.attach(child),
            _ => {}
        }
    }
}

/// Shape a meter name is bound to on first registration
#[derive(Debug)]
struct NameBinding {
    kind: MeterKind,
    label_keys: Vec<String>,
}

#[derive(Default)]
struct Meters {
    by_id: HashMap<MeterId, RegisteredMeter>,
    by_name: HashMap<String, NameBinding>,
}

impl Meters {
    fn check_binding(&self, descriptor: &MeterDescriptor) -> Result<()> {
        let Some(binding) = self.by_name.get(descriptor.id.name()) else {
            return Ok(());
        };
        if binding.kind != descriptor.kind {
            return Err(MetricsError::KindConflict {
                name: descriptor.id.name().to_string(),
                existing: binding.kind,
                requested: descriptor.kind,
            });
        }
        let requested: Vec<String> = descriptor.id.tag_keys().into_iter().map(String::from).collect();
        if binding.label_keys != requested {
            return Err(MetricsError::LabelConflict {
                name: descriptor.id.name().to_string(),
                existing: binding.label_keys.clone(),
                requested,
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RegistryInner {
    meters: Mutex<Meters>,
    sinks: RwLock<Vec<Arc<SinkRegistry>>>,
}

/// Process-wide aggregation point, passed explicitly to every meter factory
///
/// Cloning is cheap and clones share state. Lock order is always
/// `meters` before `sinks`.
#[derive(Clone, Default)]
pub struct MeterRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for MeterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterRegistry")
            .field("meters", &self.meter_count())
            .field("sinks", &self.sink_count())
            .finish()
    }
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink. Meters registered earlier are forwarded to it as well.
    ///
    /// Every existing meter is resolved in the sink before any handle is
    /// bound, so a failure leaves all handles untouched.
    pub(crate) fn add_sink(&self, sink: Arc<SinkRegistry>) -> Result<()> {
        let meters = lock(&self.inner.meters);
        let mut resolved = Vec::with_capacity(meters.by_id.len());
        for meter in meters.by_id.values() {
            if let Some(child) = meter.resolve(&sink)? {
                resolved.push((meter, child));
            }
        }
        for (meter, child) in resolved {
            meter.bind(child);
        }
        info!(
            "MeterRegistry: attached {} sink ({} existing meters)",
            sink.name(),
            meters.by_id.len()
        );
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        Ok(())
    }

    pub fn sink_count(&self) -> usize {
        self.inner
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of distinct (name, label-set) series registered
    pub fn meter_count(&self) -> usize {
        lock(&self.inner.meters).by_id.len()
    }

    pub(crate) fn register_counter(&self, descriptor: MeterDescriptor) -> Result<Counter> {
        match self.get_or_register(descriptor, |id| Handle::Counter(Counter::new(id)))? {
            Handle::Counter(counter) => Ok(counter),
            other => Err(other.conflict(MeterKind::Counter)),
        }
    }

    pub(crate) fn register_gauge(&self, descriptor: MeterDescriptor) -> Result<Gauge> {
        match self.get_or_register(descriptor, |id| Handle::Gauge(Gauge::new(id)))? {
            Handle::Gauge(gauge) => Ok(gauge),
            other => Err(other.conflict(MeterKind::Gauge)),
        }
    }

    pub(crate) fn register_histogram(
        &self,
        descriptor: MeterDescriptor,
    ) -> Result<DistributionSummary> {
        match self.get_or_register(descriptor, |id| {
            Handle::Histogram(DistributionSummary::new(id))
        })? {
            Handle::Histogram(summary) => Ok(summary),
            other => Err(other.conflict(MeterKind::Histogram)),
        }
    }

    fn get_or_register(
        &self,
        descriptor: MeterDescriptor,
        create: impl FnOnce(MeterId) -> Handle,
    ) -> Result<Handle> {
        let mut meters = lock(&self.inner.meters);
        meters.check_binding(&descriptor)?;

        if let Some(existing) = meters.by_id.get(&descriptor.id) {
            return Ok(existing.handle.clone());
        }

        let meter = RegisteredMeter {
            handle: create(descriptor.id.clone()),
            descriptor,
        };
        {
            let sinks = self
                .inner
                .sinks
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let mut resolved = Vec::with_capacity(sinks.len());
            for sink in sinks.iter() {
                if let Some(child) = meter.resolve(sink)? {
                    resolved.push(child);
                }
            }
            for child in resolved {
                meter.bind(child);
            }
        }
        debug!("MeterRegistry: registered {} {}", meter.descriptor.kind, meter.descriptor.id);

        let handle = meter.handle.clone();
        meters
            .by_name
            .entry(meter.descriptor.id.name().to_string())
            .or_insert_with(|| NameBinding {
                kind: meter.descriptor.kind,
                label_keys: meter.descriptor.id.tag_keys().into_iter().map(String::from).collect(),
            });
        meters.by_id.insert(meter.descriptor.id.clone(), meter);
        Ok(handle)
    }
}

/// Backend series for one accepted meter
#[derive(Clone)]
pub(crate) enum Child {
    Counter(prometheus::Counter),
    Gauge(prometheus::IntGauge),
    Histogram(prometheus::Histogram),
}

/// One metric family in a sink's prometheus registry
enum Family {
    Counter(CounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

impl Family {
    fn create(id: &MeterId, descriptor: &MeterDescriptor) -> Result<Self> {
        let labels = id.tag_keys();
        let family = match descriptor.kind {
            MeterKind::Counter => Family::Counter(CounterVec::new(
                Opts::new(id.name(), descriptor.help(id)),
                &labels,
            )?),
            MeterKind::Gauge => Family::Gauge(IntGaugeVec::new(
                Opts::new(id.name(), descriptor.help(id)),
                &labels,
            )?),
            MeterKind::Histogram => Family::Histogram(HistogramVec::new(
                HistogramOpts::new(id.name(), descriptor.help(id))
                    .buckets(descriptor.buckets.clone()),
                &labels,
            )?),
        };
        Ok(family)
    }

    fn kind(&self) -> MeterKind {
        match self {
            Family::Counter(_) => MeterKind::Counter,
            Family::Gauge(_) => MeterKind::Gauge,
            Family::Histogram(_) => MeterKind::Histogram,
        }
    }

    fn register_into(&self, registry: &Registry) -> Result<()> {
        match self {
            Family::Counter(vec) => registry.register(Box::new(vec.clone()))?,
            Family::Gauge(vec) => registry.register(Box::new(vec.clone()))?,
            Family::Histogram(vec) => registry.register(Box::new(vec.clone()))?,
        }
        Ok(())
    }

    fn child(&self, id: &MeterId) -> Result<Child> {
        let values = id.tag_values();
        let child = match self {
            Family::Counter(vec) => {
                Child::Counter(vec.get_metric_with_label_values(values.as_slice())?)
            }
            Family::Gauge(vec) => Child::Gauge(vec.get_metric_with_label_values(values.as_slice())?),
            Family::Histogram(vec) => {
                Child::Histogram(vec.get_metric_with_label_values(values.as_slice())?)
            }
        };
        Ok(child)
    }
}

#[derive(Default)]
struct SinkState {
    families: HashMap<String, (Family, Vec<String>)>,
    series: BTreeMap<MeterId, Child>,
}

/// A backend registry with its own filters, fed by the composite registry
pub(crate) struct SinkRegistry {
    name: &'static str,
    filters: Vec<MeterFilter>,
    registry: Registry,
    state: Mutex<SinkState>,
}

impl SinkRegistry {
    pub(crate) fn new(name: &'static str, registry: Registry, filters: Vec<MeterFilter>) -> Self {
        Self {
            name,
            filters,
            registry,
            state: Mutex::new(SinkState::default()),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Backend series for a meter, or `None` when a filter denies it
    fn child(&self, descriptor: &MeterDescriptor) -> Result<Option<Child>> {
        let Some(id) = filter::apply(&self.filters, &descriptor.id) else {
            return Ok(None);
        };

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if let Some(child) = state.series.get(&id) {
            return Ok(Some(child.clone()));
        }

        let child = match state.families.get(id.name()) {
            Some((family, label_keys)) => {
                if family.kind() != descriptor.kind {
                    return Err(MetricsError::KindConflict {
                        name: id.name().to_string(),
                        existing: family.kind(),
                        requested: descriptor.kind,
                    });
                }
                let requested = id.tag_keys();
                if *label_keys != requested {
                    return Err(MetricsError::LabelConflict {
                        name: id.name().to_string(),
                        existing: label_keys.clone(),
                        requested: requested.into_iter().map(String::from).collect(),
                    });
                }
                family.child(&id)?
            }
            None => {
                let family = Family::create(&id, descriptor)?;
                family.register_into(&self.registry)?;
                let child = family.child(&id)?;
                let label_keys = id.tag_keys().into_iter().map(String::from).collect();
                state
                    .families
                    .insert(id.name().to_string(), (family, label_keys));
                child
            }
        };

        state.series.insert(id, child.clone());
        Ok(Some(child))
    }

    /// Snapshot of every series this sink has accepted, ordered by id
    pub(crate) fn series(&self) -> Vec<(MeterId, Child)> {
        lock(&self.state)
            .series
            .iter()
            .map(|(id, child)| (id.clone(), child.clone()))
            .collect()
    }

    /// Prometheus text exposition of this sink's view
    pub(crate) fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        Ok(encoder.encode_to_string(&metric_families)?)
    }
}
