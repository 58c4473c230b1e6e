//! Metrics facade for medlemskap
//!
//! Meters are registered through one explicitly passed [`MeterRegistry`] and
//! fanned out to two sinks:
//!
//! 1. **Pull** ([`PullRegistry`]): Prometheus text exposition, served by the
//!    application's `/metrics` endpoint.
//! 2. **Push** ([`PushRegistry`]): a filtered, tagged view shipped every step
//!    to Sensu as Influx line protocol.

pub mod error;
pub mod filter;
pub mod latency_tracker;
pub mod meter;
pub mod metrics;
pub mod pull;
pub mod push;
pub mod registry;
pub mod reporter;

pub use error::{MetricsError, Result};
pub use filter::MeterFilter;
pub use latency_tracker::LatencyGuard;
pub use meter::{Counter, DistributionSummary, Gauge, MeterBuilder, MeterId, MeterKind, Timer};
pub use pull::{PullRegistry, configure_pull_registry};
pub use push::{PushConfig, PushRegistry, SensuConfig, configure_push_registry};
pub use registry::MeterRegistry;
pub use reporter::{EventTransport, PushReporter, SensuEvent, SensuSocket};
