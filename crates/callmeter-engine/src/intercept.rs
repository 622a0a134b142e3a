//! Host-side interception: which operations are instrumented, and how.
//!
//! Specs are registered per operation (`unit`, `method`) or per unit. A unit
//! spec covers every operation of that unit that has no spec of its own, the
//! way a profiler applies one setting to a whole controller. Operations with
//! no spec at all run uninstrumented.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use callmeter_core::call::{simple_type_name, ArgSnapshot, CallContext, CallTarget};
use callmeter_core::spec::InstrumentationSpec;

use crate::engine::InstrumentedCallEngine;

/// Percentiles published by [`Interceptor::profiler_spec`].
pub const PROFILER_PERCENTILES: [f64; 3] = [0.90, 0.95, 0.9999];

/// Registry of instrumented operations in front of an engine.
pub struct Interceptor {
    engine: Arc<InstrumentedCallEngine>,
    methods: DashMap<CallTarget, Arc<InstrumentationSpec>>,
    units: DashMap<Arc<str>, Arc<InstrumentationSpec>>,
}

impl Interceptor {
    pub fn new(engine: Arc<InstrumentedCallEngine>) -> Self {
        Self {
            engine,
            methods: DashMap::new(),
            units: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<InstrumentedCallEngine> {
        &self.engine
    }

    /// Histogram plus p90/p95/p99.99, for blanket profiling of a unit.
    pub fn profiler_spec() -> InstrumentationSpec {
        InstrumentationSpec::builder()
            .histogram(true)
            .percentiles(PROFILER_PERCENTILES)
            .build()
            .unwrap_or_default()
    }

    /// Instrument one operation. Returns the spec it replaced, if any.
    pub fn register_method(
        &self,
        unit: &str,
        method: &str,
        spec: InstrumentationSpec,
    ) -> Option<Arc<InstrumentationSpec>> {
        self.methods.insert(CallTarget::new(unit, method), Arc::new(spec))
    }

    /// Instrument every operation of `unit` that has no method-level spec.
    pub fn register_unit(&self, unit: &str, spec: InstrumentationSpec) -> Option<Arc<InstrumentationSpec>> {
        self.units.insert(Arc::from(unit), Arc::new(spec))
    }

    /// Method-level spec first, then unit-level.
    pub fn resolve(&self, target: &CallTarget) -> Option<Arc<InstrumentationSpec>> {
        if let Some(spec) = self.methods.get(target) {
            return Some(Arc::clone(spec.value()));
        }
        self.units
            .get(target.declaring_unit())
            .map(|spec| Arc::clone(spec.value()))
    }

    pub fn registered_methods(&self) -> Vec<CallTarget> {
        self.methods.iter().map(|e| e.key().clone()).collect()
    }

    pub fn registered_units(&self) -> Vec<String> {
        self.units.iter().map(|e| e.key().to_string()).collect()
    }

    pub fn call<T, E, F>(&self, ctx: CallContext<F, E>) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: Debug,
    {
        match self.resolve(ctx.target()) {
            Some(spec) => self.engine.execute(ctx, &spec),
            None => {
                let (_, _, _, proceed) = ctx.into_parts();
                proceed()
            }
        }
    }

    pub async fn call_async<T, E, Fut>(&self, ctx: CallContext<Fut, E>) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Debug,
    {
        match self.resolve(ctx.target()) {
            Some(spec) => self.engine.execute_async(ctx, &spec).await,
            None => {
                let (_, _, _, proceed) = ctx.into_parts();
                proceed.await
            }
        }
    }
}

/// Decorator around a unit of business logic.
///
/// Every `invoke` goes through the interceptor under the unit's name, which
/// defaults to the simple type name of `S`.
pub struct Instrumented<S> {
    inner: Arc<S>,
    unit: Arc<str>,
    interceptor: Arc<Interceptor>,
}

impl<S> Clone for Instrumented<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            unit: Arc::clone(&self.unit),
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

impl<S> Instrumented<S> {
    pub fn new(inner: S, interceptor: Arc<Interceptor>) -> Self {
        Self {
            inner: Arc::new(inner),
            unit: Arc::from(simple_type_name::<S>()),
            interceptor,
        }
    }

    pub fn with_unit_name(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn invoke<T, E>(&self, op: &str, args: ArgSnapshot, f: impl FnOnce(&S) -> Result<T, E>) -> Result<T, E>
    where
        T: Debug,
        E: Debug,
    {
        let inner = &*self.inner;
        let ctx = CallContext::new(CallTarget::new(Arc::clone(&self.unit), op), move || f(inner)).with_args(args);
        self.interceptor.call(ctx)
    }

    pub async fn invoke_async<'a, T, E, Fut>(
        &'a self,
        op: &str,
        args: ArgSnapshot,
        f: impl FnOnce(&'a S) -> Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Debug,
        E: Debug,
    {
        let ctx = CallContext::new(CallTarget::new(Arc::clone(&self.unit), op), f(&*self.inner)).with_args(args);
        self.interceptor.call_async(ctx).await
    }
}
