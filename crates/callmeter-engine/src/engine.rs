//! Instrumented-call engine.
//!
//! Wraps one call in either a single-shot timer or a long-task timer, tags it
//! from the spec and the call identity, and publishes to the injected
//! registry. The call's `Ok`/`Err` is returned untouched.
//!
//! Two error domains are handled asymmetrically:
//! - call errors are only read (to classify the outcome tag) and returned as is;
//! - instrumentation errors (register/record/start/stop, including panics
//!   raised by a registry or tag builder) are caught where they happen, logged
//!   at `debug`, and discarded. They never reach the caller.
//!
//! Cleanup lives in `Drop` guards so a started timer or sample is finished
//! exactly once on every exit path: return, error, panic unwinding, and
//! cancellation of an async call.

use std::fmt::Debug;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use callmeter_core::call::{ArgSnapshot, CallContext, CallTarget, ErrorClassifier};
use callmeter_core::error::{CallMeterError, Result as MeterResult};
use callmeter_core::spec::{InstrumentationSpec, EXCEPTION_TAG, OUTCOME_NONE};
use callmeter_core::tags::{MeterId, Tag, Tags};

use crate::registry::{LongTaskSample, MeterRegistry, TimerOptions};
use crate::tagging::{ClassMethodTags, TagBuilder};

/// Outcome tag value when the wrapped call panicked.
pub const OUTCOME_PANIC: &str = "panic";
/// Outcome tag value when an async call was dropped before completing.
pub const OUTCOME_CANCELLED: &str = "cancelled";

/// Stateless across invocations; share it via `Arc`.
pub struct InstrumentedCallEngine {
    registry: Arc<dyn MeterRegistry>,
    tag_builder: Arc<dyn TagBuilder>,
}

impl InstrumentedCallEngine {
    /// Engine tagging calls with `class` and `method`.
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        Self::with_tag_builder(registry, Arc::new(ClassMethodTags))
    }

    pub fn with_tag_builder(registry: Arc<dyn MeterRegistry>, tag_builder: Arc<dyn TagBuilder>) -> Self {
        Self {
            registry,
            tag_builder,
        }
    }

    pub fn registry(&self) -> &Arc<dyn MeterRegistry> {
        &self.registry
    }

    /// Run a sync call under `spec`.
    ///
    /// `T: Debug` is required whether or not `spec` enables result logging,
    /// since the logging decision is made per call at runtime. Wrap results
    /// without a `Debug` impl in a newtype that provides one.
    pub fn execute<T, E, F>(&self, ctx: CallContext<F, E>, spec: &InstrumentationSpec) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: Debug,
    {
        let (target, args, classify, proceed) = ctx.into_parts();

        let out = if spec.is_long_task() {
            let _sample = LongTaskGuard::start(self, &target, spec);
            proceed()
        } else {
            let mut timed = TimedGuard::start(self, &target, spec);
            let out = proceed();
            timed.settle(&out, classify);
            out
        };

        log_result(spec, &target, &args, &out);
        out
    }

    /// Run an async call under `spec`. Same `T: Debug` requirement as
    /// [`execute`](Self::execute).
    ///
    /// Dropping the returned future before the call finishes still stops the
    /// sample (long task) or records the timer with outcome `cancelled`.
    pub async fn execute_async<T, E, Fut>(
        &self,
        ctx: CallContext<Fut, E>,
        spec: &InstrumentationSpec,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Debug,
    {
        let (target, args, classify, proceed) = ctx.into_parts();

        let out = if spec.is_long_task() {
            let _sample = LongTaskGuard::start(self, &target, spec);
            proceed.await
        } else {
            let mut timed = TimedGuard::start(self, &target, spec);
            let out = proceed.await;
            timed.settle(&out, classify);
            out
        };

        log_result(spec, &target, &args, &out);
        out
    }

    /// Spec extra tags, then outcome tag (if any), then context tags.
    fn merged_tags(&self, target: &CallTarget, spec: &InstrumentationSpec, outcome: Option<&str>) -> Tags {
        let mut tags = spec.extra_tags().clone();
        if let Some(outcome) = outcome {
            tags.push(Tag::new(EXCEPTION_TAG, outcome));
        }
        tags.append(self.tag_builder.tags(target));
        tags
    }

    fn record_timed(
        &self,
        target: &CallTarget,
        spec: &InstrumentationSpec,
        outcome: &str,
        started: Instant,
    ) -> MeterResult<()> {
        let id = MeterId::new(
            spec.resolved_metric_name(),
            self.merged_tags(target, spec, Some(outcome)),
        );
        let timer = self.registry.timer(id, &TimerOptions::from_spec(spec))?;
        timer.record_since(started)
    }

    fn start_long_task(
        &self,
        target: &CallTarget,
        spec: &InstrumentationSpec,
    ) -> MeterResult<Box<dyn LongTaskSample>> {
        let id = MeterId::new(spec.resolved_metric_name(), self.merged_tags(target, spec, None));
        let timer = self.registry.long_task_timer(id, spec.description())?;
        timer.start()
    }
}

/// Run an instrumentation step, turning panics into errors.
fn shielded<R>(step: impl FnOnce() -> MeterResult<R>) -> MeterResult<R> {
    catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|_| Err(CallMeterError::Internal("instrumentation step panicked".into())))
}

fn log_result<T: Debug, E>(
    spec: &InstrumentationSpec,
    target: &CallTarget,
    args: &ArgSnapshot,
    out: &Result<T, E>,
) {
    if !spec.logging_enabled() {
        return;
    }
    if let Ok(value) = out {
        tracing::info!(call = %target, result = ?value, args = %args, "instrumented call returned");
    }
}

struct TimedGuard<'a> {
    engine: &'a InstrumentedCallEngine,
    target: &'a CallTarget,
    spec: &'a InstrumentationSpec,
    started: Instant,
    outcome: Option<String>,
}

impl<'a> TimedGuard<'a> {
    fn start(engine: &'a InstrumentedCallEngine, target: &'a CallTarget, spec: &'a InstrumentationSpec) -> Self {
        Self {
            engine,
            target,
            spec,
            started: Instant::now(),
            outcome: None,
        }
    }

    fn settle<T, E>(&mut self, out: &Result<T, E>, classify: ErrorClassifier<E>) {
        let outcome = match out {
            Ok(_) => OUTCOME_NONE.to_string(),
            Err(e) => shielded(|| Ok(classify(e))).unwrap_or_else(|_| "unknown".to_string()),
        };
        self.outcome = Some(outcome);
    }
}

impl Drop for TimedGuard<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            if std::thread::panicking() {
                OUTCOME_PANIC.to_string()
            } else {
                OUTCOME_CANCELLED.to_string()
            }
        });

        // discarded: never surfaces to the caller
        if let Err(e) = shielded(|| self.engine.record_timed(self.target, self.spec, &outcome, self.started)) {
            tracing::debug!(
                call = %self.target,
                metric = self.spec.resolved_metric_name(),
                code = e.code().as_str(),
                error = %e,
                "timer record discarded"
            );
        }
    }
}

struct LongTaskGuard<'a> {
    target: &'a CallTarget,
    sample: Option<Box<dyn LongTaskSample>>,
}

impl<'a> LongTaskGuard<'a> {
    fn start(engine: &InstrumentedCallEngine, target: &'a CallTarget, spec: &InstrumentationSpec) -> Self {
        let sample = match shielded(|| engine.start_long_task(target, spec)) {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::debug!(
                    call = %target,
                    metric = spec.resolved_metric_name(),
                    code = e.code().as_str(),
                    error = %e,
                    "long task timer unavailable, proceeding without sample"
                );
                None
            }
        };
        Self { target, sample }
    }
}

impl Drop for LongTaskGuard<'_> {
    fn drop(&mut self) {
        let Some(sample) = self.sample.take() else { return; };
        // discarded: never surfaces to the caller
        if let Err(e) = shielded(|| sample.stop().map(|_| ())) {
            tracing::debug!(call = %self.target, error = %e, "long task sample stop discarded");
        }
    }
}
