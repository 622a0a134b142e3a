//! Test doubles shared by the engine integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callmeter_core::error::{CallMeterError, Result};
use callmeter_core::tags::MeterId;
use callmeter_engine::obs::InMemoryRegistry;
use callmeter_engine::registry::{
    Counter, Gauge, LongTaskSample, LongTaskTimer, MeterRegistry, Timer, TimerOptions,
};

/// Every operation fails.
#[derive(Default)]
pub struct FailingRegistry;

impl MeterRegistry for FailingRegistry {
    fn timer(&self, id: MeterId, _: &TimerOptions) -> Result<Arc<dyn Timer>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
    fn long_task_timer(&self, id: MeterId, _: Option<&str>) -> Result<Arc<dyn LongTaskTimer>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
    fn counter(&self, id: MeterId, _: Option<&str>) -> Result<Arc<dyn Counter>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
    fn gauge(&self, id: MeterId, _: Option<&str>) -> Result<Arc<dyn Gauge>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
}

/// Every operation panics.
#[derive(Default)]
pub struct PanickingRegistry;

impl MeterRegistry for PanickingRegistry {
    fn timer(&self, _: MeterId, _: &TimerOptions) -> Result<Arc<dyn Timer>> {
        panic!("registry exploded")
    }
    fn long_task_timer(&self, _: MeterId, _: Option<&str>) -> Result<Arc<dyn LongTaskTimer>> {
        panic!("registry exploded")
    }
    fn counter(&self, _: MeterId, _: Option<&str>) -> Result<Arc<dyn Counter>> {
        panic!("registry exploded")
    }
    fn gauge(&self, _: MeterId, _: Option<&str>) -> Result<Arc<dyn Gauge>> {
        panic!("registry exploded")
    }
}

/// Registers fine, then fails every record / stop.
#[derive(Default)]
pub struct BrokenInstrumentRegistry {
    pub starts: Arc<AtomicUsize>,
    pub stop_attempts: Arc<AtomicUsize>,
}

struct BrokenTimer;

impl Timer for BrokenTimer {
    fn record(&self, _: Duration) -> Result<()> {
        Err(CallMeterError::Record("disk full".into()))
    }
}

struct BrokenLongTask {
    starts: Arc<AtomicUsize>,
    stop_attempts: Arc<AtomicUsize>,
}

impl LongTaskTimer for BrokenLongTask {
    fn start(&self) -> Result<Box<dyn LongTaskSample>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(BrokenSample {
            stop_attempts: Arc::clone(&self.stop_attempts),
        }))
    }
}

struct BrokenSample {
    stop_attempts: Arc<AtomicUsize>,
}

impl LongTaskSample for BrokenSample {
    fn stop(self: Box<Self>) -> Result<Duration> {
        self.stop_attempts.fetch_add(1, Ordering::SeqCst);
        Err(CallMeterError::Record("clock went backwards".into()))
    }
}

impl MeterRegistry for BrokenInstrumentRegistry {
    fn timer(&self, _: MeterId, _: &TimerOptions) -> Result<Arc<dyn Timer>> {
        Ok(Arc::new(BrokenTimer))
    }
    fn long_task_timer(&self, _: MeterId, _: Option<&str>) -> Result<Arc<dyn LongTaskTimer>> {
        Ok(Arc::new(BrokenLongTask {
            starts: Arc::clone(&self.starts),
            stop_attempts: Arc::clone(&self.stop_attempts),
        }))
    }
    fn counter(&self, id: MeterId, _: Option<&str>) -> Result<Arc<dyn Counter>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
    fn gauge(&self, id: MeterId, _: Option<&str>) -> Result<Arc<dyn Gauge>> {
        Err(CallMeterError::Registration(format!("refused {id}")))
    }
}

/// Event seen by `RecordingRegistry`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RegisterTimer { id: MeterId, opts: TimerOptions },
    Record { id: MeterId },
    RegisterLongTask { id: MeterId, description: Option<String> },
    Start { id: MeterId },
    Stop { id: MeterId },
}

/// Delegates to an `InMemoryRegistry` and journals every interaction.
#[derive(Default)]
pub struct RecordingRegistry {
    pub inner: InMemoryRegistry,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingRegistry {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

struct RecordingTimer {
    id: MeterId,
    inner: Arc<dyn Timer>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Timer for RecordingTimer {
    fn record(&self, elapsed: Duration) -> Result<()> {
        self.events.lock().unwrap().push(Event::Record { id: self.id.clone() });
        self.inner.record(elapsed)
    }
}

struct RecordingLongTask {
    id: MeterId,
    inner: Arc<dyn LongTaskTimer>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl LongTaskTimer for RecordingLongTask {
    fn start(&self) -> Result<Box<dyn LongTaskSample>> {
        self.events.lock().unwrap().push(Event::Start { id: self.id.clone() });
        Ok(Box::new(RecordingSample {
            id: self.id.clone(),
            inner: self.inner.start()?,
            events: Arc::clone(&self.events),
        }))
    }
}

struct RecordingSample {
    id: MeterId,
    inner: Box<dyn LongTaskSample>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl LongTaskSample for RecordingSample {
    fn stop(self: Box<Self>) -> Result<Duration> {
        self.events.lock().unwrap().push(Event::Stop { id: self.id.clone() });
        self.inner.stop()
    }
}

impl MeterRegistry for RecordingRegistry {
    fn timer(&self, id: MeterId, opts: &TimerOptions) -> Result<Arc<dyn Timer>> {
        self.events.lock().unwrap().push(Event::RegisterTimer {
            id: id.clone(),
            opts: opts.clone(),
        });
        let inner = self.inner.timer(id.clone(), opts)?;
        Ok(Arc::new(RecordingTimer {
            id,
            inner,
            events: Arc::clone(&self.events),
        }))
    }

    fn long_task_timer(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn LongTaskTimer>> {
        self.events.lock().unwrap().push(Event::RegisterLongTask {
            id: id.clone(),
            description: description.map(str::to_string),
        });
        let inner = self.inner.long_task_timer(id.clone(), description)?;
        Ok(Arc::new(RecordingLongTask {
            id,
            inner,
            events: Arc::clone(&self.events),
        }))
    }

    fn counter(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Counter>> {
        self.inner.counter(id, description)
    }

    fn gauge(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Gauge>> {
        self.inner.gauge(id, description)
    }
}
