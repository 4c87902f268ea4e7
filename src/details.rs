//! Commit-log domain types held by the details cache.
//!
//! [`FullCommitDetails`] is the fully loaded record produced by a log
//! provider. [`LoadingDetails`] is the lightweight stand-in handed out while
//! the full record is not cached yet. Both are keyed by [`CommitIndex`], the
//! dense integer id a commit storage assigns to every `(hash, root)` pair.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dense index of a commit in the log's commit storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct CommitIndex(u32);

impl CommitIndex {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for CommitIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for CommitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hex-encoded revision hash as reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines: the first 8 characters.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Root directory of a repository registered in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct VcsRoot(PathBuf);

impl VcsRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for VcsRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A commit hash qualified by the repository it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommitId {
    pub hash: CommitHash,
    pub root: VcsRoot,
}

impl CommitId {
    pub fn new(hash: CommitHash, root: VcsRoot) -> Self {
        Self { hash, root }
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash.short(), self.root)
    }
}

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VcsUser {
    pub name: String,
    pub email: String,
}

impl VcsUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Moved,
}

/// A single file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileChange {
    pub kind: ChangeKind,
    pub before: Option<PathBuf>,
    pub after: Option<PathBuf>,
}

impl FileChange {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Added,
            before: None,
            after: Some(path.into()),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            kind: ChangeKind::Modified,
            before: Some(path.clone()),
            after: Some(path),
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            before: Some(path.into()),
            after: None,
        }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Moved,
            before: Some(from.into()),
            after: Some(to.into()),
        }
    }

    /// Path the change is displayed under: the new path, or the old one for
    /// deletions.
    pub fn path(&self) -> Option<&Path> {
        self.after.as_deref().or(self.before.as_deref())
    }
}

/// Complete details of one commit, as read from a log provider.
///
/// Values are immutable once cached; the cache hands out `Arc`s of the same
/// allocation to every reader.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FullCommitDetails {
    pub id: CommitId,
    pub parents: Vec<CommitHash>,
    pub author: VcsUser,
    pub committer: VcsUser,
    /// Milliseconds since the Unix epoch.
    pub author_time: u64,
    /// Milliseconds since the Unix epoch.
    pub commit_time: u64,
    pub subject: String,
    pub full_message: String,
    pub changes: Vec<FileChange>,
}

impl FullCommitDetails {
    pub fn hash(&self) -> &CommitHash {
        &self.id.hash
    }

    pub fn root(&self) -> &VcsRoot {
        &self.id.root
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Placeholder returned for a commit whose full details are not cached.
///
/// Cheap to build: no storage or provider access happens at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingDetails {
    commit: CommitIndex,
    loading_task: u64,
    created_at: Instant,
}

impl LoadingDetails {
    pub fn new(commit: CommitIndex, loading_task: u64) -> Self {
        Self {
            commit,
            loading_task,
            created_at: Instant::now(),
        }
    }

    pub fn commit(&self) -> CommitIndex {
        self.commit
    }

    /// Number of the loading task this placeholder was issued for. Cache
    /// placeholders always use task 0.
    pub fn loading_task(&self) -> u64 {
        self.loading_task
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
