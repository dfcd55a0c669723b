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

//! Temporary directories holding materialized snapshots.
//!
//! A [`StagingArea`] is created for every side of a comparison that is not
//! already a plain path in a local working copy. Its directory name always
//! ends with [`STAGING_MARKER`], and nothing without that marker is ever
//! removed.

use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::instrument;

use crate::engine::EngineError;
use crate::engine::ItemId;
use crate::engine::ItemKind;
use crate::engine::Snapshot;
use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::set_readonly_recursively;

/// Suffix carried by every staging directory name.
pub const STAGING_MARKER: &str = "_tmp";

/// Error while creating, populating or removing a staging area.
#[derive(Debug, Error)]
#[expect(missing_docs)]
pub enum StagingError {
    #[error("Failed to create temporary directory")]
    Create(#[source] io::Error),
    #[error("Failed to write staged file")]
    Write(#[source] PathError),
    #[error("Failed to read snapshot content")]
    Export(#[source] EngineError),
    #[error("Failed to make staged files read-only")]
    ReadOnly(#[source] PathError),
    #[error("Failed to remove temporary directory")]
    Remove(#[source] PathError),
    #[error("Refusing to remove {path}: not a staging directory", path = path.display())]
    NotAStagingPath { path: PathBuf },
}

/// How a snapshot is written into a staging area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingLayout {
    /// Each named file is written flat, under its base name.
    Files,
    /// The whole content tree of the snapshot is exported.
    WholeTree,
}

/// A uniquely named temporary directory owned by one comparison.
///
/// The directory is removed by [`StagingArea::dispose()`] or, failing that,
/// when the area is dropped.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    disposed: bool,
}

impl StagingArea {
    /// Allocates a new directory named `<prefix><random><hint>_tmp` under
    /// `parent`.
    ///
    /// If `cleanup` is false, the directory is left in place. Some tools keep
    /// reading their inputs after the process we spawned has exited.
    pub fn create_in(
        parent: &Path,
        prefix: &str,
        hint: &str,
        cleanup: bool,
    ) -> Result<Self, StagingError> {
        let suffix = format!("{}{STAGING_MARKER}", sanitize_hint(hint));
        let path = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempdir_in(parent)
            .map_err(StagingError::Create)?
            .keep();
        tracing::debug!(?path, cleanup, "created staging area");
        Ok(Self {
            path,
            disposed: !cleanup,
        })
    }

    /// Root directory of the area.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `items` of `snapshot` into the area and marks them read-only.
    #[instrument(skip(self, snapshot, items), fields(path = ?self.path))]
    pub fn materialize(
        &self,
        snapshot: &dyn Snapshot,
        items: &[ItemId],
        layout: StagingLayout,
    ) -> Result<(), StagingError> {
        match layout {
            StagingLayout::Files => write_files(&self.path, snapshot, items)?,
            StagingLayout::WholeTree => write_tree(&self.path, snapshot)?,
        }
        set_readonly_recursively(&self.path)
            .context(&self.path)
            .map_err(StagingError::ReadOnly)
    }

    /// Removes the directory. Calling this again, or on an area created
    /// without cleanup, does nothing.
    pub fn dispose(&mut self) -> Result<(), StagingError> {
        check_staging_path(&self.path)?;
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        remove_tree(&self.path)?;
        tracing::debug!(path = ?self.path, "removed staging area");
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            tracing::warn!(?err, path = ?self.path, "failed to remove staging area");
        }
    }
}

/// Removes `path` recursively, provided its name carries [`STAGING_MARKER`].
pub fn remove_staging_dir(path: &Path) -> Result<(), StagingError> {
    check_staging_path(path)?;
    remove_tree(path)
}

fn check_staging_path(path: &Path) -> Result<(), StagingError> {
    let is_staging = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(STAGING_MARKER));
    if is_staging {
        Ok(())
    } else {
        Err(StagingError::NotAStagingPath {
            path: path.to_path_buf(),
        })
    }
}

fn remove_tree(path: &Path) -> Result<(), StagingError> {
    #[cfg(windows)]
    crate::file_util::clear_readonly_recursively(path)
        .context(path)
        .map_err(StagingError::Remove)?;
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StagingError::Remove(PathError {
            path: path.to_path_buf(),
            source: err,
        })),
    }
}

/// Writes each file of `items` present in `snapshot` directly under `dir`,
/// named by its base name. Bytes are copied as is.
pub fn write_files(
    dir: &Path,
    snapshot: &dyn Snapshot,
    items: &[ItemId],
) -> Result<(), StagingError> {
    for id in items {
        if !snapshot.has_identifier(id) {
            continue;
        }
        if snapshot.kind(id).map_err(StagingError::Export)? != ItemKind::File {
            continue;
        }
        let repo_path = snapshot
            .path_for_identifier(id)
            .map_err(StagingError::Export)?;
        let Some(name) = repo_path.file_name() else {
            continue;
        };
        let disk_path = dir.join(name);
        let mut reader = snapshot.read_file(id).map_err(StagingError::Export)?;
        let mut file = File::create(&disk_path)
            .context(&disk_path)
            .map_err(StagingError::Write)?;
        io::copy(&mut reader, &mut file)
            .context(&disk_path)
            .map_err(StagingError::Write)?;
        tracing::debug!(?disk_path, "staged file");
    }
    Ok(())
}

/// Exports the whole content tree of `snapshot` into `dir`.
pub fn write_tree(dir: &Path, snapshot: &dyn Snapshot) -> Result<(), StagingError> {
    snapshot.export_to(dir).map_err(StagingError::Export)
}

fn sanitize_hint(hint: &str) -> String {
    hint.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
