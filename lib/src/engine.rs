// Copyright 2024 The extdiff Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Capabilities consumed from the repository engine.
//!
//! Branch storage, revision history, working-copy inventory and locking are
//! owned by the engine. This crate only holds shared references to the
//! objects handed out here.

use std::any::Any;
use std::fmt;
use std::fmt::Debug;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::delta::Delta;
use crate::repo_path::RepoPathBuf;
use crate::revision::RevisionSpec;

/// Stable identifier of a tracked item. Unlike its path, the identifier
/// follows the item across renames.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps an engine-provided identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as the engine spelled it.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemId").field(&self.0).finish()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a tracked item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// A regular file with content.
    File,
    /// A directory, including the snapshot root.
    Directory,
}

/// Error surfaced by the repository engine.
///
/// Variants are propagated unchanged so the caller can tell a path that is not
/// tracked from one that lives in another branch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The location has no live working copy. The caller may fall back to the
    /// branch.
    #[error("No working copy found at {location}")]
    NoWorkingCopy {
        /// The location that was opened.
        location: String,
    },
    /// The location is not inside any branch.
    #[error("Not a branch: {location}")]
    NotBranch {
        /// The location that was opened.
        location: String,
    },
    /// The path exists in the branch location but is not tracked.
    #[error("Path is not versioned: {path}")]
    NotVersioned {
        /// The path as the user spelled it.
        path: String,
    },
    /// The path belongs to a different branch than the one being resolved.
    #[error("Path {path} is not a child of {base}")]
    PathNotChild {
        /// The path as the user spelled it.
        path: String,
        /// Base location of the branch that was expected to contain it.
        base: String,
    },
    /// The location is not on the local filesystem.
    #[error("{location} is not a local path")]
    NotLocal {
        /// The location that was opened.
        location: String,
    },
    /// The revision specifier does not name a revision of the branch.
    #[error("Requested revision {spec} does not exist in branch {branch}")]
    NoSuchRevision {
        /// The specifier as the user spelled it.
        spec: String,
        /// Nickname of the branch the specifier was resolved against.
        branch: String,
    },
    /// The item is not present in the snapshot.
    #[error("Item {id} is not present in this snapshot")]
    NoSuchItem {
        /// The missing identifier.
        id: ItemId,
    },
    /// The engine could not reach a remote location.
    #[error("Could not connect to {location}")]
    Connection {
        /// The location that was opened.
        location: String,
        /// Source error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A read or write lock could not be taken.
    #[error("Could not lock {location} for reading")]
    Lock {
        /// The locked location.
        location: String,
    },
    /// Any other engine failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Result of an engine call.
pub type EngineResult<T> = Result<T, EngineError>;

/// Immutable view of the tracked items at one point in time: a live working
/// copy, a historical revision, or another branch's working state.
pub trait Snapshot: Any + Debug {
    /// Looks up the identifier of the item at `path`. Returns `None` if the
    /// path is not tracked in this snapshot.
    fn identifier_for_path(&self, path: &RepoPathBuf) -> EngineResult<Option<ItemId>>;

    /// Returns the path of `id` within this snapshot.
    fn path_for_identifier(&self, id: &ItemId) -> EngineResult<RepoPathBuf>;

    /// Whether `id` is present in this snapshot.
    fn has_identifier(&self, id: &ItemId) -> bool;

    /// Returns the kind of `id`.
    fn kind(&self, id: &ItemId) -> EngineResult<ItemKind>;

    /// Writes the whole content tree of this snapshot into the existing empty
    /// directory `dir`.
    fn export_to(&self, dir: &Path) -> EngineResult<()>;

    /// Opens the raw bytes of file `id`.
    fn read_file(&self, id: &ItemId) -> EngineResult<Box<dyn Read + '_>>;

    /// Computes the changes from `old` to this snapshot, restricted to the
    /// given paths and everything below them.
    fn changes_from(
        &self,
        old: &dyn Snapshot,
        specific_paths: &[RepoPathBuf],
    ) -> EngineResult<Delta>;

    /// Takes a shared read lock on the owning working copy or branch.
    fn lock_read(&self) -> EngineResult<()>;

    /// Releases a lock taken by [`Snapshot::lock_read()`].
    fn unlock(&self);

    /// Allows engines to recognize their own snapshots in
    /// [`Snapshot::changes_from()`].
    fn as_any(&self) -> &dyn Any;
}

/// Result of resolving a [`RevisionSpec`] against a branch.
#[derive(Clone, Debug)]
pub struct HistoricalSnapshot {
    /// Human-readable revision number, used in staging-area names.
    pub revno: String,
    /// The snapshot at that revision.
    pub snapshot: Arc<dyn Snapshot>,
}

/// A named line of revision history.
pub trait Branch: Debug {
    /// Base location: a local path or a remote URL.
    fn base(&self) -> &str;

    /// Short human-readable name.
    fn nick(&self) -> &str;

    /// Root directory if the branch is stored on the local filesystem.
    fn local_root(&self) -> Option<&Path>;

    /// The most recently committed snapshot ("basis").
    fn latest_snapshot(&self) -> EngineResult<Arc<dyn Snapshot>>;

    /// Resolves `spec` in this branch's history.
    fn historical_snapshot(&self, spec: &RevisionSpec) -> EngineResult<HistoricalSnapshot>;
}

/// A live local checkout found by [`RepoEngine::open_working_copy_containing()`].
#[derive(Clone, Debug)]
pub struct WorkingCopyMatch {
    /// The branch the working copy is bound to.
    pub branch: Arc<dyn Branch>,
    /// The current state of the working copy.
    pub tree: Arc<dyn Snapshot>,
    /// Root directory of the checkout.
    pub root: PathBuf,
    /// The opened location relative to `root`.
    pub path: RepoPathBuf,
}

/// A branch found by [`RepoEngine::open_branch_containing()`].
#[derive(Clone, Debug)]
pub struct BranchMatch {
    /// The branch containing the location.
    pub branch: Arc<dyn Branch>,
    /// The opened location relative to the branch base.
    pub path: RepoPathBuf,
}

/// Entry points into the repository engine.
pub trait RepoEngine: Debug {
    /// Opens the working copy containing `location`.
    ///
    /// Fails with [`EngineError::NoWorkingCopy`] for a branch without a
    /// checkout, and with [`EngineError::NotLocal`] for remote locations.
    fn open_working_copy_containing(&self, location: &str) -> EngineResult<WorkingCopyMatch>;

    /// Opens the branch containing `location`, local or remote.
    fn open_branch_containing(&self, location: &str) -> EngineResult<BranchMatch>;

    /// Whether `location` is reachable through the local filesystem.
    fn is_local(&self, location: &str) -> bool;
}
