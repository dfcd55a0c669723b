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

//! Maps path arguments to the branch and tree owning them.
//!
//! Resolution happens in two steps. [`LocationResolver::locate()`] opens the
//! branch of the first argument and decides how many of the following
//! arguments belong to it, without taking any lock. Once the caller holds read
//! locks, [`Location::resolve_items()`] looks up the tracked items.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::engine::Branch;
use crate::engine::EngineError;
use crate::engine::ItemId;
use crate::engine::RepoEngine;
use crate::engine::Snapshot;
use crate::file_util::absolute_path;
use crate::file_util::path_within;
use crate::repo_path::RelativePathParseError;
use crate::repo_path::RepoPathBuf;

/// Error while resolving paths or revisions against a branch.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The repository engine refused the location, path or revision.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The path cannot be expressed relative to the tree root.
    #[error("Invalid path {path}")]
    InvalidPath {
        /// The path as the user spelled it.
        path: String,
        /// Source error.
        #[source]
        source: RelativePathParseError,
    },
}

/// How the tree of a [`Location`] is reachable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeAccess {
    /// A live working copy checked out at `root`.
    WorkingCopy {
        /// Root directory of the checkout.
        root: PathBuf,
    },
    /// A branch on the local filesystem without a working copy. The tree is
    /// the latest revision.
    Repository {
        /// Base directory of the branch.
        root: PathBuf,
    },
    /// A branch reachable only through the engine. The tree is the latest
    /// revision.
    Remote,
}

/// A branch, its effective tree, and the arguments that belong to it.
#[derive(Clone)]
pub struct Location {
    /// Branch owning the arguments.
    pub branch: Arc<dyn Branch>,
    /// The working copy state, or the latest revision if there is no working
    /// copy.
    pub tree: Arc<dyn Snapshot>,
    /// How `tree` is reachable.
    pub access: TreeAccess,
    /// Consumed arguments as given by the user. Never empty.
    pub inputs: Vec<String>,
    /// Consumed arguments relative to the tree root, in the same order.
    pub paths: Vec<RepoPathBuf>,
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("branch", &self.branch.base())
            .field("access", &self.access)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Location {
    /// Whether the tree is a live working copy on disk.
    pub fn is_working_copy(&self) -> bool {
        matches!(self.access, TreeAccess::WorkingCopy { .. })
    }

    /// Root of the working copy, if any.
    pub fn working_copy_root(&self) -> Option<&Path> {
        match &self.access {
            TreeAccess::WorkingCopy { root } => Some(root),
            TreeAccess::Repository { .. } | TreeAccess::Remote => None,
        }
    }

    fn local_root(&self) -> Option<&Path> {
        match &self.access {
            TreeAccess::WorkingCopy { root } | TreeAccess::Repository { root } => Some(root),
            TreeAccess::Remote => None,
        }
    }

    /// Looks up the tracked item of each consumed argument.
    ///
    /// The tree must be locked for reading.
    #[instrument(skip(engine))]
    pub fn resolve_items(self, engine: &dyn RepoEngine) -> Result<LocatedItems, ResolutionError> {
        let mut ids = Vec::with_capacity(self.paths.len());
        for (input, path) in self.inputs.iter().zip(&self.paths) {
            match self.tree.identifier_for_path(path)? {
                Some(id) => ids.push(id),
                None if engine.is_local(input) => {
                    return Err(EngineError::NotVersioned {
                        path: input.clone(),
                    }
                    .into());
                }
                None => {
                    return Err(EngineError::PathNotChild {
                        path: input.clone(),
                        base: self.branch.base().to_owned(),
                    }
                    .into());
                }
            }
        }
        tracing::debug!(?ids, "resolved items");
        Ok(LocatedItems {
            location: self,
            ids,
        })
    }
}

/// A [`Location`] with the identifiers of its arguments.
#[derive(Clone, Debug)]
pub struct LocatedItems {
    /// The location.
    pub location: Location,
    /// One identifier per consumed argument. Never empty.
    pub ids: Vec<ItemId>,
}

impl LocatedItems {
    /// The item named by the first argument.
    pub fn focus(&self) -> &ItemId {
        &self.ids[0]
    }

    /// Path of the item named by the first argument.
    pub fn focus_path(&self) -> &RepoPathBuf {
        &self.location.paths[0]
    }
}

/// Resolves path arguments relative to `cwd`.
#[derive(Debug)]
pub struct LocationResolver<'a> {
    engine: &'a dyn RepoEngine,
    cwd: &'a Path,
}

impl<'a> LocationResolver<'a> {
    /// Creates a resolver. `cwd` must be absolute.
    pub fn new(engine: &'a dyn RepoEngine, cwd: &'a Path) -> Self {
        Self { engine, cwd }
    }

    /// Opens the branch of `inputs[0]` and consumes the following inputs for
    /// as long as they belong to the same branch. Returns the location and
    /// the unconsumed remainder.
    ///
    /// Empty `inputs` stand for the current directory.
    #[instrument(skip(self))]
    pub fn locate<'i>(
        &self,
        inputs: &'i [String],
    ) -> Result<(Location, &'i [String]), ResolutionError> {
        let cwd_input;
        let (first, rest) = match inputs.split_first() {
            Some((first, rest)) => (first, rest),
            None => {
                cwd_input = self.cwd.to_string_lossy().into_owned();
                (&cwd_input, &[][..])
            }
        };
        let mut location = self.open_first(first)?;
        let mut consumed = 0;
        for input in rest {
            let Some(path) = self.path_in(&location, input)? else {
                break;
            };
            location.inputs.push(input.clone());
            location.paths.push(path);
            consumed += 1;
        }
        let remainder = &rest[consumed..];
        tracing::debug!(?location, ?remainder, "located branch");
        Ok((location, remainder))
    }

    fn open_first(&self, input: &str) -> Result<Location, ResolutionError> {
        let target = self.engine_location(input);
        match self.engine.open_working_copy_containing(&target) {
            Ok(found) => {
                return Ok(Location {
                    branch: found.branch,
                    tree: found.tree,
                    access: TreeAccess::WorkingCopy { root: found.root },
                    inputs: vec![input.to_owned()],
                    paths: vec![found.path],
                });
            }
            Err(EngineError::NoWorkingCopy { .. } | EngineError::NotLocal { .. }) => {}
            Err(err) => return Err(err.into()),
        }
        let found = self.engine.open_branch_containing(&target)?;
        let tree = found.branch.latest_snapshot()?;
        let access = match found.branch.local_root() {
            Some(root) => TreeAccess::Repository {
                root: root.to_path_buf(),
            },
            None => TreeAccess::Remote,
        };
        Ok(Location {
            branch: found.branch,
            tree,
            access,
            inputs: vec![input.to_owned()],
            paths: vec![found.path],
        })
    }

    /// Returns the path of `input` relative to the tree of `location`, or
    /// `None` if it belongs elsewhere.
    fn path_in(
        &self,
        location: &Location,
        input: &str,
    ) -> Result<Option<RepoPathBuf>, ResolutionError> {
        if let Some(root) = location.local_root() {
            if !self.engine.is_local(input) {
                return Ok(None);
            }
            let Some(relative) = path_within(root, &absolute_path(self.cwd, input)) else {
                return Ok(None);
            };
            let path = RepoPathBuf::from_relative_path(relative).map_err(|source| {
                ResolutionError::InvalidPath {
                    path: input.to_owned(),
                    source,
                }
            })?;
            Ok(Some(path))
        } else {
            let found = self
                .engine
                .open_branch_containing(&self.engine_location(input))?;
            if found.branch.base() == location.branch.base() {
                Ok(Some(found.path))
            } else {
                Ok(None)
            }
        }
    }

    /// Local arguments are made absolute, since the engine does not know our
    /// working directory.
    fn engine_location(&self, input: &str) -> String {
        if self.engine.is_local(input) {
            absolute_path(self.cwd, input).to_string_lossy().into_owned()
        } else {
            input.to_owned()
        }
    }
}
