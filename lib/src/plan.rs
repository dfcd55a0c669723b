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

//! Decides which two snapshots are compared, and how.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::delta::Delta;
use crate::delta::Diff;
use crate::engine::ItemId;
use crate::engine::ItemKind;
use crate::engine::Snapshot;
use crate::location::LocatedItems;
use crate::location::ResolutionError;
use crate::repo_path::RepoPathBuf;
use crate::revision::RevisionRequest;
use crate::staging::StagingLayout;

/// Invalid combination of paths, branches and revisions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    /// Revisions only make sense within one branch.
    #[error("Cannot specify -r with multiple branches")]
    RevisionsWithTwoBranches,
    /// The paths belong to more than two branches.
    #[error("Cannot compare more than two branches")]
    TooManyBranches,
    /// More than two revisions were given.
    #[error("--revision takes exactly one or two revision specifiers")]
    TooManyRevisions,
    /// A range without its start, as in `..3`.
    #[error("--revision range must start with a revision")]
    MissingFirstRevision,
}

/// Checks the shape of a request before anything is locked.
///
/// `second_branch` tells whether some paths were left over after the first
/// branch, and `more_branches` whether paths were left over after the second
/// one.
pub fn check_usage(
    second_branch: bool,
    more_branches: bool,
    revisions: &RevisionRequest,
) -> Result<(), UsageError> {
    if second_branch && revisions.is_specified() {
        Err(UsageError::RevisionsWithTwoBranches)
    } else if more_branches {
        Err(UsageError::TooManyBranches)
    } else {
        Ok(())
    }
}

/// How the tool is run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareMode {
    /// One file on each side.
    SingleFile,
    /// Two directories, walked by the tool.
    Recursive,
    /// Two directories and the list of changed files, one tool run per file.
    Iterative,
}

/// Where one side of the comparison is read from.
#[derive(Clone)]
pub enum Placement {
    /// Directly from the working copy.
    InPlace(PathBuf),
    /// From a staging area to be filled with `items` of the snapshot.
    Staged {
        /// Hint included in the staging area name, e.g. `-rev3`.
        hint: String,
        /// Items to write in [`StagingLayout::Files`] layout.
        items: Vec<ItemId>,
        /// Path appended to the staging area root to reach the compared
        /// item.
        path: RepoPathBuf,
    },
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InPlace(path) => f.debug_tuple("InPlace").field(path).finish(),
            Self::Staged { hint, items, path } => f
                .debug_struct("Staged")
                .field("hint", hint)
                .field("items", &items.len())
                .field("path", path)
                .finish(),
        }
    }
}

/// One side of the comparison.
#[derive(Clone, Debug)]
pub struct PlannedSide {
    /// The snapshot shown on this side.
    pub snapshot: Arc<dyn Snapshot>,
    /// Where its content comes from.
    pub placement: Placement,
}

/// Outcome of [`RevisionPairResolver::resolve()`].
#[derive(Clone, Debug)]
pub struct ComparisonPlan {
    /// The old and new sides.
    pub sides: Diff<PlannedSide>,
    /// How the tool is run.
    pub mode: CompareMode,
    /// How staged sides are written.
    pub layout: StagingLayout,
    /// Repository path of the compared item. Entries of the iteration list are
    /// made relative to it.
    pub focus: RepoPathBuf,
    /// Items the delta is restricted to. The old set is located in the old
    /// snapshot, the new set in the new one.
    pub restriction: Diff<Vec<ItemId>>,
}

impl ComparisonPlan {
    /// Returns the changed files to walk in [`CompareMode::Iterative`] mode.
    pub fn iteration_list(&self, delta: &Delta) -> Vec<String> {
        iteration_list(delta, &self.focus)
    }
}

/// Lists modified files with content changes, relative to `focus`. Added and
/// removed files have nothing to compare against.
pub fn iteration_list(delta: &Delta, focus: &RepoPathBuf) -> Vec<String> {
    delta
        .text_modified_paths()
        .map(|path| {
            if focus.is_root() {
                return path.as_internal_file_string().to_owned();
            }
            match path.strip_prefix(focus) {
                Some(rest) if rest.is_root() => ".".to_owned(),
                Some(rest) => format!("./{rest}"),
                None => path.as_internal_file_string().to_owned(),
            }
        })
        .collect()
}

/// Picks the pair of snapshots for a request.
#[derive(Debug)]
pub struct RevisionPairResolver<'a> {
    first: &'a LocatedItems,
    second: Option<&'a LocatedItems>,
    revisions: &'a RevisionRequest,
    input_count: usize,
    recursive_tool: bool,
}

impl<'a> RevisionPairResolver<'a> {
    /// `input_count` is the number of path arguments, over both branches.
    pub fn new(
        first: &'a LocatedItems,
        second: Option<&'a LocatedItems>,
        revisions: &'a RevisionRequest,
        input_count: usize,
        recursive_tool: bool,
    ) -> Self {
        Self {
            first,
            second,
            revisions,
            input_count,
            recursive_tool,
        }
    }

    /// Builds the plan. Revisions are looked up here, so the trees must be
    /// locked for reading.
    pub fn resolve(&self) -> Result<ComparisonPlan, ResolutionError> {
        let first = &self.first.location;
        let single_input = self.input_count == 1;
        let has_second = self.second.is_some();
        let in_subdir = first.tree.kind(self.first.focus())? == ItemKind::Directory;

        let layout = if !in_subdir && (single_input || has_second) {
            StagingLayout::Files
        } else {
            StagingLayout::WholeTree
        };
        let focus = self.first.focus_path().clone();
        let mode = if self.recursive_tool {
            CompareMode::Recursive
        } else if single_input && !in_subdir {
            CompareMode::SingleFile
        } else {
            CompareMode::Iterative
        };

        let before = self.old_side(in_subdir)?;
        let after = self.new_side(in_subdir)?;
        let restriction = Diff::new(
            self.first.ids.clone(),
            self.second.unwrap_or(self.first).ids.clone(),
        );
        if let Some(second) = self.second
            && second.ids != self.first.ids
        {
            tracing::debug!(
                first = ?self.first.ids,
                second = ?second.ids,
                "item sets of the two branches differ"
            );
        }
        let plan = ComparisonPlan {
            sides: Diff::new(before, after),
            mode,
            layout,
            focus: if single_input || has_second {
                focus
            } else {
                RepoPathBuf::root()
            },
            restriction,
        };
        tracing::debug!(?plan, "planned comparison");
        Ok(plan)
    }

    fn old_side(&self, in_subdir: bool) -> Result<PlannedSide, ResolutionError> {
        let first = &self.first.location;
        if let Some(spec) = self.revisions.first() {
            let historical = first.branch.historical_snapshot(spec)?;
            Ok(self.staged(
                historical.snapshot,
                format!("-rev{}", historical.revno),
                self.first,
                in_subdir,
            ))
        } else if self.second.is_some() {
            match self.in_place(self.first) {
                Some(path) => Ok(PlannedSide {
                    snapshot: first.tree.clone(),
                    placement: Placement::InPlace(path),
                }),
                None => Ok(self.staged(
                    first.tree.clone(),
                    format!("-{}", first.branch.nick()),
                    self.first,
                    in_subdir,
                )),
            }
        } else {
            let basis = first.branch.latest_snapshot()?;
            Ok(self.staged(basis, "-basis".to_owned(), self.first, in_subdir))
        }
    }

    fn new_side(&self, in_subdir: bool) -> Result<PlannedSide, ResolutionError> {
        let first = &self.first.location;
        if let Some(spec) = self.revisions.second() {
            let historical = first.branch.historical_snapshot(spec)?;
            Ok(self.staged(
                historical.snapshot,
                format!("-rev{}", historical.revno),
                self.first,
                in_subdir,
            ))
        } else if let Some(second) = self.second {
            let tree = second.location.tree.clone();
            match self.in_place(second) {
                Some(path) => Ok(PlannedSide {
                    snapshot: tree,
                    placement: Placement::InPlace(path),
                }),
                None => Ok(self.staged(
                    tree,
                    format!("-{}", second.location.branch.nick()),
                    second,
                    in_subdir,
                )),
            }
        } else if let Some(path) = self.in_place(self.first) {
            Ok(PlannedSide {
                snapshot: first.tree.clone(),
                placement: Placement::InPlace(path),
            })
        } else {
            let basis = first.branch.latest_snapshot()?;
            Ok(self.staged(basis, "-basis".to_owned(), self.first, in_subdir))
        }
    }

    fn staged(
        &self,
        snapshot: Arc<dyn Snapshot>,
        hint: String,
        items: &LocatedItems,
        in_subdir: bool,
    ) -> PlannedSide {
        PlannedSide {
            snapshot,
            placement: Placement::Staged {
                hint,
                items: items.ids.clone(),
                path: self.staged_path(items, in_subdir),
            },
        }
    }

    /// Where the compared item of `items` ends up inside its staging area.
    /// Files are written under their own base name, directories keep their
    /// repository path.
    fn staged_path(&self, items: &LocatedItems, in_subdir: bool) -> RepoPathBuf {
        let focus = items.focus_path();
        if !(self.input_count == 1 || self.second.is_some()) {
            RepoPathBuf::root()
        } else if in_subdir {
            focus.clone()
        } else {
            match focus.file_name() {
                Some(name) => RepoPathBuf::root().join(name),
                None => RepoPathBuf::root(),
            }
        }
    }

    /// Path of the compared item inside a working copy, if `items` live in
    /// one.
    fn in_place(&self, items: &LocatedItems) -> Option<PathBuf> {
        let root = items.location.working_copy_root()?;
        if self.input_count == 1 || self.second.is_some() {
            Some(items.focus_path().to_fs_path(root))
        } else {
            Some(root.to_path_buf())
        }
    }
}
