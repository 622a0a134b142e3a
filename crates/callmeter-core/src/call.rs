//! Per-invocation call context.
//!
//! A `CallContext` names the call (declaring unit + operation), carries a
//! read-only argument snapshot for optional logging, and owns the single-use
//! proceed capability. For sync calls the capability is an
//! `FnOnce() -> Result<T, E>`; for async calls it is a
//! `Future<Output = Result<T, E>>`. Both can only be run once by construction.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Identity of the wrapped call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallTarget {
    declaring_unit: Arc<str>,
    operation: Arc<str>,
}

impl CallTarget {
    pub fn new(declaring_unit: impl Into<Arc<str>>, operation: impl Into<Arc<str>>) -> Self {
        Self {
            declaring_unit: declaring_unit.into(),
            operation: operation.into(),
        }
    }

    pub fn declaring_unit(&self) -> &str {
        &self.declaring_unit
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_unit, self.operation)
    }
}

/// Argument snapshot, captured as JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArgSnapshot(Vec<Value>);

impl ArgSnapshot {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Capture one argument. Values that fail to serialize are kept as `null`.
    pub fn push<A: Serialize + ?Sized>(&mut self, arg: &A) {
        self.0.push(serde_json::to_value(arg).unwrap_or(Value::Null));
    }

    pub fn with<A: Serialize + ?Sized>(mut self, arg: &A) -> Self {
        self.push(arg);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ArgSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("[]"),
        }
    }
}

/// Maps a call error to its outcome tag value.
pub type ErrorClassifier<E> = fn(&E) -> String;

/// Simple (unqualified, generics stripped) name of `T`.
///
/// `my_app::inventory::OutOfRange` becomes `OutOfRange`,
/// `alloc::boxed::Box<dyn core::error::Error>` becomes `Box`.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Name of the concrete error value, read from its `Debug` rendering.
///
/// Derived `Debug` output starts with the type or variant name (`Name`,
/// `Name(..)`, `Name { .. }`), and boxed trait objects forward to the inner
/// error, so `Box<dyn Error>` holding a `ParseIntError` yields
/// `ParseIntError` and `StockError::EmptyBatch` yields `EmptyBatch`. Any
/// other rendering (quoted strings, free-form messages) falls back to the
/// simple type name of `E`.
pub fn concrete_error_name<E: fmt::Debug + ?Sized>(error: &E) -> String {
    let rendered = format!("{error:?}");
    let ident_len = rendered
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rendered.len());
    let (ident, rest) = rendered.split_at(ident_len);
    let derived_shape = rest.is_empty() || rest.starts_with('(') || rest.starts_with(" {");
    if derived_shape && ident.starts_with(|c: char| c.is_ascii_uppercase()) {
        ident.to_string()
    } else {
        simple_type_name::<E>().to_string()
    }
}

/// Everything the engine needs for one invocation.
pub struct CallContext<F, E> {
    target: CallTarget,
    args: ArgSnapshot,
    classify: ErrorClassifier<E>,
    proceed: F,
}

impl<F, E: fmt::Debug> CallContext<F, E> {
    /// Context whose errors are tagged by [`concrete_error_name`].
    pub fn new(target: CallTarget, proceed: F) -> Self {
        Self {
            target,
            args: ArgSnapshot::new(),
            classify: concrete_error_name::<E>,
            proceed,
        }
    }
}

impl<F, E> CallContext<F, E> {

    pub fn with_args(mut self, args: ArgSnapshot) -> Self {
        self.args = args;
        self
    }

    /// Override outcome classification, e.g. to tag enum variants.
    pub fn classify_with(mut self, classify: ErrorClassifier<E>) -> Self {
        self.classify = classify;
        self
    }

    pub fn target(&self) -> &CallTarget {
        &self.target
    }

    pub fn args(&self) -> &ArgSnapshot {
        &self.args
    }

    /// Split into identity, args, classifier, and the proceed capability.
    pub fn into_parts(self) -> (CallTarget, ArgSnapshot, ErrorClassifier<E>, F) {
        (self.target, self.args, self.classify, self.proceed)
    }
}

impl<F, E> fmt::Debug for CallContext<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("target", &self.target)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
