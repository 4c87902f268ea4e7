//! Key interner mapping external keys to dense `u32` handles.
//!
//! Backs [`InMemoryCommitStorage`](crate::storage::InMemoryCommitStorage):
//! every distinct commit id gets the next free handle, and handles resolve
//! back to their key in O(1).

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Monotonic key interner that assigns a `u32` handle to each unique key.
#[derive(Debug)]
pub struct KeyInterner<K> {
    index: FxHashMap<K, u32>,
    keys: Vec<K>,
}

impl<K> Default for KeyInterner<K> {
    fn default() -> Self {
        Self {
            index: FxHashMap::default(),
            keys: Vec::new(),
        }
    }
}

impl<K> KeyInterner<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `key`, inserting it if missing.
    ///
    /// Returns `None` only when all `u32` handles are taken.
    pub fn intern(&mut self, key: &K) -> Option<u32> {
        if let Some(&id) = self.index.get(key) {
            return Some(id);
        }
        let id = u32::try_from(self.keys.len()).ok()?;
        self.keys.push(key.clone());
        self.index.insert(key.clone(), id);
        Some(id)
    }

    /// Returns the handle for `key` if it exists.
    pub fn get_handle(&self, key: &K) -> Option<u32> {
        self.index.get(key).copied()
    }

    /// Resolves a handle to its original key.
    pub fn resolve(&self, handle: u32) -> Option<&K> {
        self.keys.get(handle as usize)
    }

    /// Returns the number of interned keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are interned.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
