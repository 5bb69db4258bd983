//! Ordered, duplicate-preserving header collections.
//!
//! # Design
//! `HeaderSet` is a plain `Vec` of key/value pairs rather than a map. Two
//! pairs with the same key are two entries: `append` never replaces, and
//! iteration yields pairs in insertion order. Lookups compare keys
//! case-insensitively, matching HTTP semantics, but keys are stored exactly
//! as given.

use serde::{Deserialize, Serialize};

/// A single header entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPair {
    pub key: String,
    pub value: String,
}

impl HeaderPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of headers. Serializes as a JSON array of `HeaderPair`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet(Vec<HeaderPair>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry after all existing ones, keeping any entry with the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(HeaderPair::new(key, value));
    }

    /// All values stored under `key`, compared case-insensitively, in order.
    pub fn get_all<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.0
            .iter()
            .filter(move |pair| pair.key.eq_ignore_ascii_case(key))
            .map(|pair| pair.value.as_str())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|pair| pair.key.eq_ignore_ascii_case(key))
            .map(|pair| pair.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.first(key).is_some()
    }

    pub fn retain(&mut self, f: impl FnMut(&HeaderPair) -> bool) {
        self.0.retain(f);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderPair> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<HeaderPair>> for HeaderSet {
    fn from(pairs: Vec<HeaderPair>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<HeaderPair> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = HeaderPair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<HeaderPair> for HeaderSet {
    fn extend<I: IntoIterator<Item = HeaderPair>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a HeaderPair;
    type IntoIter = std::slice::Iter<'a, HeaderPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for HeaderSet {
    type Item = HeaderPair;
    type IntoIter = std::vec::IntoIter<HeaderPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
