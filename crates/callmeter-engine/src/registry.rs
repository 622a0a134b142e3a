//! Metric registry contract consumed by the engine.
//!
//! The engine only ever talks to a registry through these traits. Every method
//! is fallible: a registry may refuse a malformed id, a conflicting meter kind,
//! or a sample, and the engine discards those failures on the call path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use callmeter_core::spec::InstrumentationSpec;
use callmeter_core::tags::MeterId;
use callmeter_core::Result;

/// Options for a single-shot timer. The first registration of an id fixes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerOptions {
    pub histogram: bool,
    pub percentiles: Vec<f64>,
    pub description: Option<String>,
}

impl TimerOptions {
    pub fn from_spec(spec: &InstrumentationSpec) -> Self {
        Self {
            histogram: spec.histogram(),
            percentiles: spec.percentiles().to_vec(),
            description: spec.description().map(str::to_string),
        }
    }
}

/// Duration recorder.
pub trait Timer: Send + Sync {
    fn record(&self, elapsed: Duration) -> Result<()>;

    /// Record the time elapsed since `start`.
    fn record_since(&self, start: Instant) -> Result<()> {
        self.record(start.elapsed())
    }
}

/// In-flight task tracker.
pub trait LongTaskTimer: Send + Sync {
    /// Mark one task as in flight.
    fn start(&self) -> Result<Box<dyn LongTaskSample>>;
}

/// One in-flight task. Consumed by `stop`, so it can only be stopped once.
pub trait LongTaskSample: Send {
    fn stop(self: Box<Self>) -> Result<Duration>;
}

pub trait Counter: Send + Sync {
    fn increment(&self, amount: f64) -> Result<()>;
}

pub trait Gauge: Send + Sync {
    fn set(&self, value: f64) -> Result<()>;
}

/// Process-wide store of named, tagged instruments.
///
/// Implementations must make registration idempotent per `MeterId` and safe
/// under concurrent first registration: two racing callers get the same
/// instrument.
pub trait MeterRegistry: Send + Sync {
    fn timer(&self, id: MeterId, opts: &TimerOptions) -> Result<Arc<dyn Timer>>;

    fn long_task_timer(
        &self,
        id: MeterId,
        description: Option<&str>,
    ) -> Result<Arc<dyn LongTaskTimer>>;

    fn counter(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Counter>>;

    fn gauge(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Gauge>>;
}
