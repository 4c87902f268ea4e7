//! In-memory commit storage.
//!
//! Assigns each distinct [`CommitId`] a dense [`CommitIndex`] and resolves
//! indices back. Backed by [`KeyInterner`], so indices are stable for the
//! lifetime of the storage and never reused.

use parking_lot::RwLock;

use crate::details::{CommitId, CommitIndex};
use crate::ds::interner::KeyInterner;
use crate::traits::CommitStorage;

#[derive(Debug, Default)]
pub struct InMemoryCommitStorage {
    ids: RwLock<KeyInterner<CommitId>>,
}

impl InMemoryCommitStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for `id`, assigning the next free one on first use.
    ///
    /// Returns `None` only once every `u32` index is taken.
    pub fn commit_index(&self, id: &CommitId) -> Option<CommitIndex> {
        if let Some(handle) = self.ids.read().get_handle(id) {
            return Some(CommitIndex::new(handle));
        }
        self.ids.write().intern(id).map(CommitIndex::new)
    }

    /// Returns the index already assigned to `id` without assigning one.
    pub fn existing_index(&self, id: &CommitId) -> Option<CommitIndex> {
        self.ids.read().get_handle(id).map(CommitIndex::new)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

impl CommitStorage for InMemoryCommitStorage {
    fn commit_id(&self, commit: CommitIndex) -> Option<CommitId> {
        self.ids.read().resolve(commit.get()).cloned()
    }
}
