//! Run-scoped result accumulator
//!
//! Profile workers append company URLs concurrently; the coordinator owns the
//! collector for the duration of one run and takes its contents once every
//! worker has finished.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Append-only, thread-safe list of strings
///
/// Cloning yields another handle to the same list.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    items: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry; returns the new length
    pub fn push(&self, item: String) -> usize {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.push(item);
        items.len()
    }

    /// Appends entries in order, atomically with respect to other writers
    pub fn extend<I>(&self, new_items: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(new_items);
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the current contents
    pub fn snapshot(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes the contents, leaving the collector empty
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Removes repeated entries, keeping the first occurrence of each
pub fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
