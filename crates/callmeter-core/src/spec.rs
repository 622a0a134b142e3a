//! Declarative instrumentation spec.
//!
//! A spec is built once at wiring time (builder or config entry), validated,
//! and then shared read-only by every invocation of the operation it governs.

use crate::error::{CallMeterError, Result};
use crate::tags::Tags;

/// Metric name used when a spec leaves `metric_name` empty.
pub const DEFAULT_METRIC_NAME: &str = "method.timed";

/// Tag key carrying the outcome classification of a timed call.
pub const EXCEPTION_TAG: &str = "exception";

/// Outcome tag value for a call that returned `Ok`.
pub const OUTCOME_NONE: &str = "none";

/// Immutable per-operation instrumentation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentationSpec {
    metric_name: String,
    extra_tags: Tags,
    long_task: bool,
    percentiles: Vec<f64>,
    histogram: bool,
    description: Option<String>,
    logging_enabled: bool,
}

impl InstrumentationSpec {
    pub fn builder() -> InstrumentationSpecBuilder {
        InstrumentationSpecBuilder::default()
    }

    /// Raw configured name (may be empty).
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Configured name, or [`DEFAULT_METRIC_NAME`] when empty.
    pub fn resolved_metric_name(&self) -> &str {
        if self.metric_name.is_empty() {
            DEFAULT_METRIC_NAME
        } else {
            &self.metric_name
        }
    }

    pub fn extra_tags(&self) -> &Tags {
        &self.extra_tags
    }

    pub fn is_long_task(&self) -> bool {
        self.long_task
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    pub fn histogram(&self) -> bool {
        self.histogram
    }

    /// `None` when the declared description was empty.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }
}

/// Builder mirroring the declarative surface; every field has a default.
#[derive(Debug, Clone, Default)]
pub struct InstrumentationSpecBuilder {
    metric_name: String,
    extra_tags: Vec<String>,
    long_task: bool,
    percentiles: Vec<f64>,
    histogram: bool,
    description: String,
    logging_enabled: bool,
}

impl InstrumentationSpecBuilder {
    pub fn metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = name.into();
        self
    }

    /// Flat `[k1, v1, k2, v2, ...]` list. Odd length fails in [`build`](Self::build).
    pub fn extra_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn long_task(mut self, yes: bool) -> Self {
        self.long_task = yes;
        self
    }

    pub fn percentiles(mut self, percentiles: impl IntoIterator<Item = f64>) -> Self {
        self.percentiles = percentiles.into_iter().collect();
        self
    }

    pub fn histogram(mut self, yes: bool) -> Self {
        self.histogram = yes;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn logging_enabled(mut self, yes: bool) -> Self {
        self.logging_enabled = yes;
        self
    }

    /// Validate and freeze the spec.
    pub fn build(self) -> Result<InstrumentationSpec> {
        let extra_tags = Tags::from_pairs(self.extra_tags.as_slice())?;

        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(CallMeterError::Configuration(format!(
                "percentile {p} is outside [0, 1]"
            )));
        }

        let description = if self.description.is_empty() {
            None
        } else {
            Some(self.description)
        };

        Ok(InstrumentationSpec {
            metric_name: self.metric_name,
            extra_tags,
            long_task: self.long_task,
            percentiles: self.percentiles,
            histogram: self.histogram,
            description,
            logging_enabled: self.logging_enabled,
        })
    }
}
