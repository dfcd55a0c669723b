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

#![expect(missing_docs)]

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("Cannot access {path}")]
pub struct PathError {
    pub path: PathBuf,
    pub source: io::Error,
}

pub trait IoResultExt<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError> {
        self.map_err(|error| PathError {
            path: path.as_ref().to_path_buf(),
            source: error,
        })
    }
}

/// Turns the given `to` path into a path relative to `base`, or returns `None`
/// if `to` is not inside `base`.
///
/// Both paths are supposed to be absolute and normalized in the same manner.
pub fn path_within(base: &Path, to: &Path) -> Option<PathBuf> {
    let suffix = to.strip_prefix(base).ok()?;
    if suffix.as_os_str().is_empty() {
        Some(".".into())
    } else {
        Some(suffix.to_path_buf())
    }
}

/// Consumes as much `..` and `.` as possible without considering symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(result.components().next_back(), Some(Component::Normal(_))) =>
            {
                // Do not pop ".."
                let popped = result.pop();
                assert!(popped);
            }
            _ => {
                result.push(c);
            }
        }
    }

    if result.as_os_str().is_empty() {
        ".".into()
    } else {
        result
    }
}

/// Makes `path` absolute against `cwd` and normalizes it.
pub fn absolute_path(cwd: &Path, path: impl AsRef<Path>) -> PathBuf {
    normalize_path(&cwd.join(path))
}

/// Marks every regular file below `path` read-only.
pub fn set_readonly_recursively(path: &Path) -> io::Result<()> {
    // Directory permission is unchanged since files under readonly directory
    // cannot be removed.
    let metadata = path.symlink_metadata()?;
    if metadata.is_dir() {
        for entry in path.read_dir()? {
            set_readonly_recursively(&entry?.path())?;
        }
        Ok(())
    } else if metadata.is_file() {
        let mut perms = metadata.permissions();
        perms.set_readonly(true);
        fs::set_permissions(path, perms)
    } else {
        Ok(())
    }
}

/// Reverts [`set_readonly_recursively()`] so the tree can be deleted on
/// platforms that refuse to unlink read-only files.
#[cfg(windows)]
pub fn clear_readonly_recursively(path: &Path) -> io::Result<()> {
    let metadata = path.symlink_metadata()?;
    if metadata.is_dir() {
        for entry in path.read_dir()? {
            clear_readonly_recursively(&entry?.path())?;
        }
        Ok(())
    } else if metadata.is_file() {
        let mut perms = metadata.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::new_temp_dir;

    #[test]
    fn normalize_too_many_dot_dot() {
        assert_eq!(normalize_path(Path::new("foo/..")), Path::new("."));
        assert_eq!(normalize_path(Path::new("foo/../..")), Path::new(".."));
        assert_eq!(
            normalize_path(Path::new("foo/../../../bar/baz/..")),
            Path::new("../../bar")
        );
    }

    #[test]
    fn test_path_within() {
        let base = Path::new("/repo");
        assert_eq!(
            path_within(base, Path::new("/repo/dir/file")),
            Some(PathBuf::from("dir/file"))
        );
        assert_eq!(path_within(base, Path::new("/repo")), Some(".".into()));
        assert_eq!(path_within(base, Path::new("/repository/file")), None);
        assert_eq!(path_within(base, Path::new("/other")), None);
    }

    #[test]
    fn test_set_readonly_recursively() {
        let temp_dir = new_temp_dir();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("file"), "content").unwrap();

        set_readonly_recursively(temp_dir.path()).unwrap();
        let perms = fs::metadata(sub.join("file")).unwrap().permissions();
        assert!(perms.readonly());
        // Directories stay writable so the tree can be removed.
        assert!(!fs::metadata(&sub).unwrap().permissions().readonly());
    }
}
