//! Dynamic tags derived from the call's identity.

use callmeter_core::call::CallTarget;
use callmeter_core::tags::Tags;

/// Tag key for the declaring unit.
pub const CLASS_TAG: &str = "class";
/// Tag key for the operation.
pub const METHOD_TAG: &str = "method";

/// Pure function from call identity to tags. Must be deterministic.
pub trait TagBuilder: Send + Sync {
    fn tags(&self, target: &CallTarget) -> Tags;
}

/// `class=<declaring unit>, method=<operation>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassMethodTags;

impl TagBuilder for ClassMethodTags {
    fn tags(&self, target: &CallTarget) -> Tags {
        Tags::of(CLASS_TAG, target.declaring_unit()).and(METHOD_TAG, target.operation())
    }
}

impl<F> TagBuilder for F
where
    F: Fn(&CallTarget) -> Tags + Send + Sync,
{
    fn tags(&self, target: &CallTarget) -> Tags {
        self(target)
    }
}
