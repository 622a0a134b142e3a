use serde::Deserialize;

use callmeter_core::error::{CallMeterError, Result};
use callmeter_core::spec::InstrumentationSpec;

use crate::intercept::Interceptor;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallMeterConfig {
    pub version: u32,

    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

impl CallMeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CallMeterError::UnsupportedVersion);
        }
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    /// Register every operation on `interceptor`. Returns how many were installed.
    ///
    /// Nothing is registered unless the whole config validates and every
    /// spec builds.
    pub fn apply(&self, interceptor: &Interceptor) -> Result<usize> {
        self.validate()?;
        let specs = self
            .operations
            .iter()
            .map(|op| op.to_spec().map(|spec| (op, spec)))
            .collect::<Result<Vec<_>>>()?;

        for (op, spec) in specs {
            let replaced = match op.method.as_deref() {
                Some(method) => interceptor.register_method(&op.unit, method, spec),
                None => interceptor.register_unit(&op.unit, spec),
            };
            if replaced.is_some() {
                tracing::warn!(
                    unit = %op.unit,
                    method = op.method.as_deref().unwrap_or("*"),
                    "duplicate operation entry, last one wins"
                );
            }
        }
        Ok(self.operations.len())
    }
}

/// One instrumented operation. `method` omitted means the whole unit.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    pub unit: String,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub metric_name: String,

    #[serde(default)]
    pub extra_tags: Vec<String>,

    #[serde(default)]
    pub long_task: bool,

    #[serde(default)]
    pub percentiles: Vec<f64>,

    #[serde(default)]
    pub histogram: bool,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub logging_enabled: bool,
}

impl OperationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.unit.trim().is_empty() {
            return Err(CallMeterError::Configuration("operations[].unit must not be empty".into()));
        }
        if matches!(self.method.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(CallMeterError::Configuration(format!(
                "operations[].method for unit {} must not be empty when set",
                self.unit
            )));
        }
        self.to_spec().map(|_| ()).map_err(|e| match e {
            CallMeterError::Configuration(msg) => CallMeterError::Configuration(format!(
                "{}.{}: {msg}",
                self.unit,
                self.method.as_deref().unwrap_or("*")
            )),
            other => other,
        })
    }

    pub fn to_spec(&self) -> Result<InstrumentationSpec> {
        InstrumentationSpec::builder()
            .metric_name(self.metric_name.clone())
            .extra_tags(self.extra_tags.iter().cloned())
            .long_task(self.long_task)
            .percentiles(self.percentiles.iter().copied())
            .histogram(self.histogram)
            .description(self.description.clone())
            .logging_enabled(self.logging_enabled)
            .build()
    }
}
