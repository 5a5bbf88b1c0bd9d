//! A vector kept sorted by a key field of its elements.
//!
//! Maps keep their live children sorted by key and their tombstones sorted by
//! tag; both lists need logarithmic lookup plus in-order iteration for the
//! merge-join performed during synchronization.

use std::cmp::Ordering;

/// Elements stored in a [`SortedVec`] expose the field they are sorted on.
pub trait SortKey {
    fn sort_key(&self) -> &str;
}

/// A `Vec` whose elements are unique and ascending by [`SortKey::sort_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedVec<T> {
    items: Vec<T>,
}

impl<T> Default for SortedVec<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: SortKey> SortedVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn search(&self, key: &str) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.sort_key().cmp(key))
    }

    /// Returns true if an element with `key` is present.
    pub fn has(&self, key: &str) -> bool {
        self.search(key).is_ok()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.search(key).ok().map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        match self.search(key) {
            Ok(i) => Some(&mut self.items[i]),
            Err(_) => None,
        }
    }

    /// Inserts `item`, replacing any element with the same key.
    pub fn upsert(&mut self, item: T) {
        match self.search(item.sort_key()) {
            Ok(i) => self.items[i] = item,
            Err(i) => self.items.insert(i, item),
        }
    }

    /// Removes and returns the element with `key`, if any.
    pub fn delete(&mut self, key: &str) -> Option<T> {
        self.search(key).ok().map(|i| self.items.remove(i))
    }

    /// Linear scan for the first element matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: SortKey> FromIterator<T> for SortedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut items: Vec<T> = iter.into_iter().collect();
        items.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        // Later duplicates win, matching repeated upserts.
        let mut deduped: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            match deduped.last() {
                Some(last) if last.sort_key().cmp(item.sort_key()) == Ordering::Equal => {
                    let idx = deduped.len() - 1;
                    deduped[idx] = item;
                }
                _ => deduped.push(item),
            }
        }
        Self { items: deduped }
    }
}

impl<'a, T> IntoIterator for &'a SortedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
