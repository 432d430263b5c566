//! Named configuration sections
//!
//! A [`SectionStore`] keeps top-level sections in insertion order. Besides the
//! usual map operations it carries a forward-only cursor
//! (`current`/`key`/`next`/`rewind`/`valid`) for callers that walk sections
//! one at a time; standard iteration through [`SectionStore::iter`] does not
//! touch the cursor.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

/// Insertion-ordered mapping of section name to payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionStore<T = Value> {
    sections: IndexMap<String, T>,
    cursor: usize,
}

impl<T> Default for SectionStore<T> {
    fn default() -> Self {
        Self {
            sections: IndexMap::new(),
            cursor: 0,
        }
    }
}

impl<T> SectionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section. When `overwrite` is false an existing section is kept
    /// and the call is a no-op. Returns `true` if the payload was stored.
    pub fn add(&mut self, name: impl Into<String>, payload: T, overwrite: bool) -> bool {
        let name = name.into();
        if !overwrite && self.sections.contains_key(&name) {
            trace!("Section '{}' exists, not overwriting", name);
            return false;
        }
        self.sections.insert(name, payload);
        true
    }

    pub fn exists(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.sections.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.sections.get_mut(name)
    }

    /// Remove a section, preserving the order of the rest.
    pub fn delete(&mut self, name: &str) -> Option<T> {
        let index = self.sections.get_index_of(name)?;
        if index < self.cursor {
            self.cursor -= 1;
        }
        self.sections.shift_remove(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
        self.cursor = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.sections.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Payload at the cursor.
    pub fn current(&self) -> Option<&T> {
        self.sections.get_index(self.cursor).map(|(_, v)| v)
    }

    /// Name at the cursor.
    pub fn key(&self) -> Option<&str> {
        self.sections.get_index(self.cursor).map(|(k, _)| k.as_str())
    }

    /// Advance the cursor.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        if self.cursor < self.sections.len() {
            self.cursor += 1;
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Whether the cursor points at a section.
    pub fn valid(&self) -> bool {
        self.cursor < self.sections.len()
    }
}

impl<T> FromIterator<(String, T)> for SectionStore<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
            cursor: 0,
        }
    }
}
