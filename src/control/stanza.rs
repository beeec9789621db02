// src/control/stanza.rs

//! Ordered field container for a single control-file stanza
//!
//! A stanza keeps its fields in the order they were last written. Writing
//! an existing key moves it to the end, so the most recently touched field
//! is always last. The control-file decoder depends on this: continuation
//! lines always extend the final field.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// One package's block of `Key: Value` fields
#[derive(Clone, Default)]
pub struct Stanza {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Stanza {
    /// Create an empty stanza
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, appending it or moving an existing key to the end
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if let Some(pos) = self.index.get(&key).copied() {
            self.entries.remove(pos);
            self.reindex_from(pos);
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Result<&str> {
        self.field(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Get a field value, or `None` when the stanza lacks it
    pub fn field(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    /// Remove a field and return its value
    ///
    /// Fields after the removed one keep their relative order.
    pub fn delete(&mut self, key: &str) -> Result<String> {
        let pos = self
            .index
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;

        let (_, value) = self.entries.remove(pos);
        self.reindex_from(pos);
        Ok(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in current order
    pub fn iter(&self) -> Fields<'_> {
        Fields {
            inner: self.entries.iter(),
        }
    }

    /// Iterate over keys in current order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Mutable access to the value of the last field
    pub(crate) fn last_value_mut(&mut self) -> Option<&mut String> {
        self.entries.last_mut().map(|(_, v)| v)
    }

    /// Fix up index slots for every entry at or after `start`
    fn reindex_from(&mut self, start: usize) {
        for (offset, (key, _)) in self.entries[start..].iter().enumerate() {
            if let Some(slot) = self.index.get_mut(key) {
                *slot = start + offset;
            }
        }
    }
}

impl PartialEq for Stanza {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Stanza {}

impl fmt::Debug for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Stanza
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut stanza = Stanza::new();
        stanza.extend(iter);
        stanza
    }
}

impl<K, V> Extend<(K, V)> for Stanza
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a Stanza {
    type Item = (&'a str, &'a str);
    type IntoIter = Fields<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the fields of a [`Stanza`]
#[derive(Clone)]
pub struct Fields<'a> {
    inner: std::slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for Fields<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Fields<'_> {}
