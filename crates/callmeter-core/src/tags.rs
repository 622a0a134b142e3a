//! Tag primitives.
//!
//! `Tags` is an ordered sequence of key/value pairs and may contain duplicate
//! keys. A `MeterId` flattens it into a sorted map where the last write for a
//! key wins, so the order in which tags are merged decides overrides.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{CallMeterError, Result};

/// One key/value pair attached to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered tag sequence (duplicates allowed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Single-tag sequence.
    pub fn of(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![Tag::new(key, value)])
    }

    /// Builder-style append.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(Tag::new(key, value));
        self
    }

    /// Parse a flat `[k1, v1, k2, v2, ...]` list.
    pub fn from_pairs<S: AsRef<str>>(flat: &[S]) -> Result<Self> {
        if flat.len() % 2 != 0 {
            return Err(CallMeterError::Configuration(format!(
                "tag list must contain key/value pairs, got {} entries",
                flat.len()
            )));
        }
        Ok(flat
            .chunks_exact(2)
            .filter_map(|pair| match pair {
                [k, v] => Some(Tag::new(k.as_ref(), v.as_ref())),
                _ => None,
            })
            .collect())
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    /// Append every tag of `other`, keeping order.
    pub fn append(&mut self, other: Tags) {
        self.0.extend(other.0);
    }

    /// Effective value for `key` (last write wins).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Tag> for Tags {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Identity of an instrument: name plus the effective tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeterId {
    name: String,
    tags: BTreeMap<String, String>,
}

impl MeterId {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        let mut flat = BTreeMap::new();
        for t in tags {
            flat.insert(t.key, t.value);
        }
        Self {
            name: name.into(),
            tags: flat,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}=\"{v}\"")?;
        }
        f.write_str("}")
    }
}
