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

//! Slash-separated paths relative to the root of a snapshot.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

/// Path of a tracked item, relative to the root of its snapshot.
///
/// The root is represented by the empty string. Components are separated by
/// `/` regardless of the platform.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct RepoPathBuf {
    // Don't add more fields. Eq, Hash, and Ord must agree with the string form.
    value: String,
}

/// The `value` is not a valid repo path because it contains empty path
/// component. For example, `"/"`, `"/foo"`, `"foo/"`, `"foo//bar"` are all
/// invalid.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error(r#"Invalid repo path input "{value}""#)]
pub struct InvalidNewRepoPathError {
    value: String,
}

/// A filesystem path could not be turned into a repo path.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RelativePathParseError {
    /// The path contains `..`, a root, or a prefix.
    #[error(r#"Invalid component "{component}" in repo-relative path "{path}""#)]
    InvalidComponent {
        /// The offending component.
        component: Box<str>,
        /// The whole input path.
        path: Box<Path>,
    },
    /// The path cannot be represented as UTF-8.
    #[error(r#"Not valid UTF-8 path "{path}""#)]
    InvalidUtf8 {
        /// The whole input path.
        path: Box<Path>,
    },
}

impl RepoPathBuf {
    /// Creates a path pointing to the root.
    pub const fn root() -> Self {
        Self {
            value: String::new(),
        }
    }

    /// Creates `RepoPathBuf` from valid string representation.
    pub fn from_internal_string(value: impl Into<String>) -> Result<Self, InvalidNewRepoPathError> {
        let value: String = value.into();
        if is_valid_repo_path_str(&value) {
            Ok(Self { value })
        } else {
            Err(InvalidNewRepoPathError { value })
        }
    }

    /// Converts a filesystem path that is already relative to the snapshot
    /// root. `"."` maps to the root.
    pub fn from_relative_path(
        relative_path: impl AsRef<Path>,
    ) -> Result<Self, RelativePathParseError> {
        let relative_path = relative_path.as_ref();
        let mut value = String::with_capacity(relative_path.as_os_str().len());
        for component in relative_path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| RelativePathParseError::InvalidUtf8 {
                            path: relative_path.into(),
                        })?;
                    if !value.is_empty() {
                        value.push('/');
                    }
                    value.push_str(name);
                }
                _ => {
                    return Err(RelativePathParseError::InvalidComponent {
                        component: component.as_os_str().to_string_lossy().into(),
                        path: relative_path.into(),
                    });
                }
            }
        }
        Ok(Self { value })
    }

    /// The full string form used internally, not for presenting to users.
    pub fn as_internal_file_string(&self) -> &str {
        &self.value
    }

    /// Consumes this and returns the underlying string representation.
    pub fn into_internal_string(self) -> String {
        self.value
    }

    /// Whether this is the snapshot root.
    pub fn is_root(&self) -> bool {
        self.value.is_empty()
    }

    /// Returns true if the `base` is a prefix of this path, component-wise.
    pub fn starts_with(&self, base: &Self) -> bool {
        self.strip_prefix(base).is_some()
    }

    /// Returns the remaining path with the `base` path removed.
    pub fn strip_prefix(&self, base: &Self) -> Option<Self> {
        if base.is_root() {
            return Some(self.clone());
        }
        let tail = self.value.strip_prefix(&base.value)?;
        if tail.is_empty() {
            Some(Self::root())
        } else {
            let value = tail.strip_prefix('/')?;
            Some(Self {
                value: value.to_owned(),
            })
        }
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let value = match self.value.rsplit_once('/') {
            Some((parent, _)) => parent.to_owned(),
            None => String::new(),
        };
        Some(Self { value })
    }

    /// Returns the last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(
            self.value
                .rsplit_once('/')
                .map_or(self.value.as_str(), |(_, name)| name),
        )
    }

    /// Iterates over the components from the root down.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.value.split('/').filter(|name| !name.is_empty())
    }

    /// Appends a single component.
    pub fn join(&self, name: &str) -> Self {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        let value = if self.is_root() {
            name.to_owned()
        } else {
            [&self.value, "/", name].concat()
        };
        Self { value }
    }

    /// Converts to a filesystem path under `base`.
    ///
    /// Paths are produced by the repository engine and are not re-validated,
    /// so use this only with paths read from a snapshot.
    pub fn to_fs_path(&self, base: &Path) -> PathBuf {
        let mut result = base.to_path_buf();
        result.extend(self.components());
        result
    }
}

impl Debug for RepoPathBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &self.value)
    }
}

impl fmt::Display for RepoPathBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Ord for RepoPathBuf {
    fn cmp(&self, other: &Self) -> Ordering {
        // Component-wise, so that "dir/sub" sorts before "dir#".
        self.components().cmp(other.components())
    }
}

impl PartialOrd for RepoPathBuf {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn is_valid_repo_path_str(value: &str) -> bool {
    !value.starts_with('/') && !value.ends_with('/') && !value.contains("//")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_path(value: &str) -> RepoPathBuf {
        RepoPathBuf::from_internal_string(value).unwrap()
    }

    #[test]
    fn test_invalid_internal_string() {
        assert!(RepoPathBuf::from_internal_string("/").is_err());
        assert!(RepoPathBuf::from_internal_string("foo/").is_err());
        assert!(RepoPathBuf::from_internal_string("foo//bar").is_err());
        assert!(RepoPathBuf::from_internal_string("").unwrap().is_root());
    }

    #[test]
    fn test_from_relative_path() {
        assert_eq!(
            RepoPathBuf::from_relative_path(".").unwrap(),
            RepoPathBuf::root()
        );
        assert_eq!(
            RepoPathBuf::from_relative_path("dir/./file").unwrap(),
            repo_path("dir/file")
        );
        assert!(RepoPathBuf::from_relative_path("../file").is_err());
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(
            repo_path("x/y").strip_prefix(&repo_path("x")),
            Some(repo_path("y"))
        );
        assert_eq!(
            repo_path("x").strip_prefix(&repo_path("x")),
            Some(RepoPathBuf::root())
        );
        assert_eq!(
            repo_path("x").strip_prefix(&RepoPathBuf::root()),
            Some(repo_path("x"))
        );
        assert_eq!(repo_path("xy").strip_prefix(&repo_path("x")), None);
        assert_eq!(repo_path("x").strip_prefix(&repo_path("x/y")), None);
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(repo_path("dir/file").parent(), Some(repo_path("dir")));
        assert_eq!(repo_path("file").parent(), Some(RepoPathBuf::root()));
        assert_eq!(RepoPathBuf::root().parent(), None);
        assert_eq!(repo_path("dir/file").file_name(), Some("file"));
        assert_eq!(RepoPathBuf::root().file_name(), None);
    }

    #[test]
    fn test_order() {
        assert!(RepoPathBuf::root() < repo_path("dir"));
        assert!(repo_path("dir") < repo_path("dir/sub"));
        assert!(repo_path("dir/sub") < repo_path("dir#"));
    }

    #[test]
    fn test_to_fs_path() {
        assert_eq!(
            repo_path("dir/file").to_fs_path(Path::new("base")),
            Path::new("base").join("dir").join("file")
        );
        assert_eq!(
            RepoPathBuf::root().to_fs_path(Path::new("base")),
            Path::new("base")
        );
    }
}
