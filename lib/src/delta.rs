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

//! Structural differences between two snapshots.

use std::collections::BTreeSet;

use itertools::Itertools as _;
use thiserror::Error;
use tracing::instrument;

use crate::engine::EngineError;
use crate::engine::ItemId;
use crate::engine::ItemKind;
use crate::engine::Snapshot;
use crate::repo_path::RepoPathBuf;

/// A pair of values, one for the old side and one for the new side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Diff<T> {
    /// The old side.
    pub before: T,
    /// The new side.
    pub after: T,
}

impl<T> Diff<T> {
    /// Creates a pair.
    pub fn new(before: T, after: T) -> Self {
        Self { before, after }
    }

    /// Applies `f` to both sides.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Diff<U> {
        Diff {
            before: f(self.before),
            after: f(self.after),
        }
    }

    /// Borrows both sides.
    pub fn as_ref(&self) -> Diff<&T> {
        Diff {
            before: &self.before,
            after: &self.after,
        }
    }
}

/// An item that was added, removed or modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Path in the new snapshot, or in the old one for removed items.
    pub path: RepoPathBuf,
    /// Identifier of the item.
    pub id: ItemId,
    /// Kind of the item.
    pub kind: ItemKind,
    /// Whether the content changed.
    pub text_changed: bool,
    /// Whether metadata such as the executable bit changed.
    pub meta_changed: bool,
}

/// An item whose path differs between the two snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamedEntry {
    /// Path in the old snapshot.
    pub old_path: RepoPathBuf,
    /// Path in the new snapshot.
    pub new_path: RepoPathBuf,
    /// Identifier of the item.
    pub id: ItemId,
    /// Kind of the item.
    pub kind: ItemKind,
    /// Whether the content changed as well.
    pub text_changed: bool,
    /// Whether metadata changed as well.
    pub meta_changed: bool,
}

/// Changes from an old snapshot to a new one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    /// Items only present in the new snapshot.
    pub added: Vec<DeltaEntry>,
    /// Items only present in the old snapshot.
    pub removed: Vec<DeltaEntry>,
    /// Items present in both under different paths.
    pub renamed: Vec<RenamedEntry>,
    /// Items present in both under the same path with changes.
    pub modified: Vec<DeltaEntry>,
}

impl Delta {
    /// Whether there are no changes at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.renamed.len() + self.modified.len()
    }

    /// Keeps only entries for which `f` returns true. Renames are kept if
    /// either side matches.
    pub fn retain(&mut self, f: impl Fn(&RepoPathBuf) -> bool) {
        self.added.retain(|entry| f(&entry.path));
        self.removed.retain(|entry| f(&entry.path));
        self.renamed
            .retain(|entry| f(&entry.old_path) || f(&entry.new_path));
        self.modified.retain(|entry| f(&entry.path));
    }

    /// Paths of modified files whose content changed, in delta order.
    pub fn text_modified_paths(&self) -> impl Iterator<Item = &RepoPathBuf> {
        self.modified
            .iter()
            .filter(|entry| entry.text_changed)
            .map(|entry| &entry.path)
    }
}

/// Error from [`compute_delta()`].
#[derive(Debug, Error)]
pub enum DeltaError {
    /// The restricted delta is empty. This is a terminal state, not a
    /// failure.
    #[error("No differences found.")]
    NoDifferences,
    /// The engine failed to compute the changes.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Computes the changes between `trees.before` and `trees.after`, restricted
/// to the given items and everything below them.
///
/// Items of `ids.after` are located in the new snapshot and items of
/// `ids.before` in the old one, so deleted items are still represented by
/// their old path. Identifiers present in neither snapshot are skipped.
///
/// Must be called with both snapshots locked for reading.
#[instrument(skip_all)]
pub fn compute_delta(
    trees: Diff<&dyn Snapshot>,
    ids: Diff<&[ItemId]>,
) -> Result<Delta, DeltaError> {
    let mut paths = BTreeSet::new();
    for id in ids.after {
        if trees.after.has_identifier(id) {
            paths.insert(trees.after.path_for_identifier(id)?);
        }
    }
    for id in ids.before {
        if trees.before.has_identifier(id) {
            paths.insert(trees.before.path_for_identifier(id)?);
        }
    }
    if paths.is_empty() {
        return Err(DeltaError::NoDifferences);
    }
    let paths = paths.into_iter().collect_vec();
    tracing::debug!(?paths, "computing delta");

    let mut delta = trees.after.changes_from(trees.before, &paths)?;
    // The engine may report more than asked for. Never leak unrelated changes.
    delta.retain(|path| paths.iter().any(|base| path.starts_with(base)));
    if delta.is_empty() {
        return Err(DeltaError::NoDifferences);
    }
    tracing::debug!(
        added = delta.added.len(),
        removed = delta.removed.len(),
        renamed = delta.renamed.len(),
        modified = delta.modified.len(),
        "computed delta"
    );
    Ok(delta)
}
