//! DashMap-backed `MeterRegistry`.
//!
//! Registration goes through `DashMap::entry`, which holds the shard lock while
//! the instrument is created, so at most one instrument exists per id even
//! under racing first registrations. Histogram buckets are fixed in
//! microseconds to avoid floating point math on the record path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use callmeter_core::error::{CallMeterError, Result};
use callmeter_core::tags::MeterId;

use crate::registry::{
    Counter, Gauge, LongTaskSample, LongTaskTimer, MeterRegistry, Timer, TimerOptions,
};

// Fixed Buckets in Microseconds (µs)
// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
const BUCKETS_MICROS: [u64; 9] = [
    100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000,
];

/// Samples kept per timer for percentile estimation.
const PERCENTILE_WINDOW: usize = 1000;

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

struct TimerCell {
    description: Option<String>,
    percentiles: Vec<f64>,
    count: AtomicU64,
    sum_micros: AtomicU64,
    max_micros: AtomicU64,
    buckets: Option<[AtomicU64; 9]>,
    window: Option<Mutex<VecDeque<u64>>>,
}

impl TimerCell {
    fn new(opts: &TimerOptions) -> Self {
        Self {
            description: opts.description.clone(),
            percentiles: opts.percentiles.clone(),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            max_micros: AtomicU64::new(0),
            buckets: opts
                .histogram
                .then(|| std::array::from_fn(|_| AtomicU64::new(0))),
            window: (!opts.percentiles.is_empty())
                .then(|| Mutex::new(VecDeque::with_capacity(PERCENTILE_WINDOW))),
        }
    }

    fn snapshot(&self, id: &MeterId) -> TimerSnapshot {
        let buckets = self
            .buckets
            .as_ref()
            .map(|b| {
                BUCKETS_MICROS
                    .iter()
                    .zip(b.iter())
                    .map(|(&le, c)| (le, c.load(Ordering::Relaxed)))
                    .collect()
            })
            .unwrap_or_default();

        let percentiles = match &self.window {
            Some(window) => {
                let mut sorted: Vec<u64> = window
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .copied()
                    .collect();
                sorted.sort_unstable();
                self.percentiles
                    .iter()
                    .map(|&p| (p, nearest_rank(&sorted, p)))
                    .collect()
            }
            None => Vec::new(),
        };

        TimerSnapshot {
            id: id.clone(),
            description: self.description.clone(),
            count: self.count.load(Ordering::Relaxed),
            sum_micros: self.sum_micros.load(Ordering::Relaxed),
            max_micros: self.max_micros.load(Ordering::Relaxed),
            buckets,
            percentiles,
        }
    }
}

fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted.get(idx).copied().unwrap_or(0)
}

impl Timer for TimerCell {
    fn record(&self, elapsed: Duration) -> Result<()> {
        let us = micros(elapsed);
        self.count.fetch_add(1, Ordering::Relaxed);
        // saturates at u64::MAX
        let _ = self
            .sum_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| Some(sum.saturating_add(us)));
        self.max_micros.fetch_max(us, Ordering::Relaxed);

        // Cumulative Buckets: Increment ALL buckets larger than value
        if let Some(buckets) = &self.buckets {
            for (&le, bucket) in BUCKETS_MICROS.iter().zip(buckets.iter()) {
                if us <= le {
                    bucket.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if let Some(window) = &self.window {
            let mut w = window.lock().unwrap_or_else(PoisonError::into_inner);
            w.push_back(us);
            if w.len() > PERCENTILE_WINDOW {
                w.pop_front();
            }
        }
        Ok(())
    }
}

struct LongTaskState {
    description: Option<String>,
    active: DashMap<u64, Instant>,
    next_id: AtomicU64,
    completed: AtomicU64,
}

struct LongTaskCell {
    state: Arc<LongTaskState>,
}

impl LongTaskTimer for LongTaskCell {
    fn start(&self) -> Result<Box<dyn LongTaskSample>> {
        let task = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.active.insert(task, Instant::now());
        Ok(Box::new(MemorySample {
            state: Arc::clone(&self.state),
            task,
        }))
    }
}

struct MemorySample {
    state: Arc<LongTaskState>,
    task: u64,
}

impl LongTaskSample for MemorySample {
    fn stop(self: Box<Self>) -> Result<Duration> {
        let (_, started) = self
            .state
            .active
            .remove(&self.task)
            .ok_or_else(|| CallMeterError::Record(format!("unknown task {}", self.task)))?;
        self.state.completed.fetch_add(1, Ordering::Relaxed);
        Ok(started.elapsed())
    }
}

/// f64 stored as bits.
struct ValueCell {
    description: Option<String>,
    bits: AtomicU64,
}

impl ValueCell {
    fn new(description: Option<&str>) -> Self {
        Self {
            description: description.map(str::to_string),
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Counter for ValueCell {
    fn increment(&self, amount: f64) -> Result<()> {
        // counters are monotonic
        if !(amount.is_finite() && amount > 0.0) {
            return Ok(());
        }
        let mut cur = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(cur) + amount).to_bits();
            match self
                .bits
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(actual) => cur = actual,
            }
        }
    }
}

impl Gauge for ValueCell {
    fn set(&self, value: f64) -> Result<()> {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }
}

enum Meter {
    Timer(Arc<TimerCell>),
    LongTask(Arc<LongTaskCell>),
    Counter(Arc<ValueCell>),
    Gauge(Arc<ValueCell>),
}

impl Meter {
    fn kind(&self) -> &'static str {
        match self {
            Meter::Timer(_) => "timer",
            Meter::LongTask(_) => "long task timer",
            Meter::Counter(_) => "counter",
            Meter::Gauge(_) => "gauge",
        }
    }
}

/// Reference registry. Cheap to share via `Arc`.
#[derive(Default)]
pub struct InMemoryRegistry {
    meters: DashMap<MeterId, Meter>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            meters: DashMap::new(),
        }
    }

    /// Process-wide default registry. Meant for the composition root only;
    /// library code should receive a registry explicitly.
    pub fn global() -> Arc<InMemoryRegistry> {
        static GLOBAL: OnceLock<Arc<InMemoryRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(InMemoryRegistry::new())))
    }

    /// Number of distinct instruments.
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    fn validate(id: &MeterId) -> Result<()> {
        if id.name().trim().is_empty() {
            return Err(CallMeterError::Registration("metric name must not be empty".into()));
        }
        if id.tags().keys().any(|k| k.trim().is_empty()) {
            return Err(CallMeterError::Registration(format!(
                "{id}: tag keys must not be empty"
            )));
        }
        Ok(())
    }

    fn conflict(id: &MeterId, existing: &Meter, wanted: &str) -> CallMeterError {
        CallMeterError::Registration(format!(
            "{id} is already registered as a {}, not a {wanted}",
            existing.kind()
        ))
    }

    /// Point-in-time copy of every instrument, sorted by id.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut snap = RegistrySnapshot::default();
        for r in self.meters.iter() {
            let id = r.key();
            match r.value() {
                Meter::Timer(t) => snap.timers.push(t.snapshot(id)),
                Meter::LongTask(l) => {
                    let now = Instant::now();
                    let active_micros = l
                        .state
                        .active
                        .iter()
                        .map(|e| micros(now.saturating_duration_since(*e.value())))
                        .sum();
                    snap.long_task_timers.push(LongTaskSnapshot {
                        id: id.clone(),
                        description: l.state.description.clone(),
                        active_tasks: l.state.active.len(),
                        active_micros,
                        completed: l.state.completed.load(Ordering::Relaxed),
                    });
                }
                Meter::Counter(c) => snap.counters.push(ValueSnapshot {
                    id: id.clone(),
                    description: c.description.clone(),
                    value: c.get(),
                }),
                Meter::Gauge(g) => snap.gauges.push(ValueSnapshot {
                    id: id.clone(),
                    description: g.description.clone(),
                    value: g.get(),
                }),
            }
        }
        snap.timers.sort_by(|a, b| a.id.cmp(&b.id));
        snap.long_task_timers.sort_by(|a, b| a.id.cmp(&b.id));
        snap.counters.sort_by(|a, b| a.id.cmp(&b.id));
        snap.gauges.sort_by(|a, b| a.id.cmp(&b.id));
        snap
    }
}

impl MeterRegistry for InMemoryRegistry {
    fn timer(&self, id: MeterId, opts: &TimerOptions) -> Result<Arc<dyn Timer>> {
        Self::validate(&id)?;
        let entry = self
            .meters
            .entry(id.clone())
            .or_insert_with(|| Meter::Timer(Arc::new(TimerCell::new(opts))));
        match entry.value() {
            Meter::Timer(t) => Ok(Arc::clone(t) as Arc<dyn Timer>),
            other => Err(Self::conflict(&id, other, "timer")),
        }
    }

    fn long_task_timer(
        &self,
        id: MeterId,
        description: Option<&str>,
    ) -> Result<Arc<dyn LongTaskTimer>> {
        Self::validate(&id)?;
        let entry = self.meters.entry(id.clone()).or_insert_with(|| {
            Meter::LongTask(Arc::new(LongTaskCell {
                state: Arc::new(LongTaskState {
                    description: description.map(str::to_string),
                    active: DashMap::new(),
                    next_id: AtomicU64::new(1),
                    completed: AtomicU64::new(0),
                }),
            }))
        });
        match entry.value() {
            Meter::LongTask(l) => Ok(Arc::clone(l) as Arc<dyn LongTaskTimer>),
            other => Err(Self::conflict(&id, other, "long task timer")),
        }
    }

    fn counter(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Counter>> {
        Self::validate(&id)?;
        let entry = self
            .meters
            .entry(id.clone())
            .or_insert_with(|| Meter::Counter(Arc::new(ValueCell::new(description))));
        match entry.value() {
            Meter::Counter(c) => Ok(Arc::clone(c) as Arc<dyn Counter>),
            other => Err(Self::conflict(&id, other, "counter")),
        }
    }

    fn gauge(&self, id: MeterId, description: Option<&str>) -> Result<Arc<dyn Gauge>> {
        Self::validate(&id)?;
        let entry = self
            .meters
            .entry(id.clone())
            .or_insert_with(|| Meter::Gauge(Arc::new(ValueCell::new(description))));
        match entry.value() {
            Meter::Gauge(g) => Ok(Arc::clone(g) as Arc<dyn Gauge>),
            other => Err(Self::conflict(&id, other, "gauge")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub id: MeterId,
    pub description: Option<String>,
    pub count: u64,
    pub sum_micros: u64,
    pub max_micros: u64,
    /// `(le_micros, cumulative_count)`; empty when histograms are off.
    pub buckets: Vec<(u64, u64)>,
    /// `(percentile, value_micros)` over the last 1000 samples.
    pub percentiles: Vec<(f64, u64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongTaskSnapshot {
    pub id: MeterId,
    pub description: Option<String>,
    pub active_tasks: usize,
    pub active_micros: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueSnapshot {
    pub id: MeterId,
    pub description: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub timers: Vec<TimerSnapshot>,
    pub long_task_timers: Vec<LongTaskSnapshot>,
    pub counters: Vec<ValueSnapshot>,
    pub gauges: Vec<ValueSnapshot>,
}

impl RegistrySnapshot {
    pub fn timers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TimerSnapshot> {
        self.timers.iter().filter(move |t| t.id.name() == name)
    }

    pub fn long_task_timers_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a LongTaskSnapshot> {
        self.long_task_timers.iter().filter(move |t| t.id.name() == name)
    }

    pub fn counter(&self, name: &str) -> Option<f64> {
        self.counters.iter().find(|c| c.id.name() == name).map(|c| c.value)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.iter().find(|g| g.id.name() == name).map(|g| g.value)
    }
}
