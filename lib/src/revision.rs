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

//! Revision specifiers as typed by the user.

use std::fmt;

use crate::plan::UsageError;

/// User-supplied reference to a point in a branch's history.
///
/// The text is opaque to this crate. It is only resolvable against the
/// branch it is paired with, see [`crate::engine::Branch::historical_snapshot()`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RevisionSpec(String);

impl RevisionSpec {
    /// Wraps the specifier text.
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    /// Returns the specifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which historical revisions the user asked to compare.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RevisionRequest {
    /// No revision given.
    #[default]
    Unspecified,
    /// Compare this revision against the current state.
    Single(RevisionSpec),
    /// Compare two historical revisions.
    Range(RevisionSpec, RevisionSpec),
}

impl RevisionRequest {
    /// Builds the request from an ordered list of specifiers. A missing second
    /// specifier (as in `3..`) leaves only the first one.
    pub fn from_specs(specs: &[Option<RevisionSpec>]) -> Result<Self, UsageError> {
        match specs {
            [] => Ok(Self::Unspecified),
            [None] | [None, None] => Ok(Self::Unspecified),
            [Some(first)] | [Some(first), None] => Ok(Self::Single(first.clone())),
            [Some(first), Some(second)] => Ok(Self::Range(first.clone(), second.clone())),
            [None, Some(_)] => Err(UsageError::MissingFirstRevision),
            _ => Err(UsageError::TooManyRevisions),
        }
    }

    /// Parses `A`, `A..B` or `A..`.
    pub fn parse(text: &str) -> Result<Self, UsageError> {
        let spec = |s: &str| (!s.is_empty()).then(|| RevisionSpec::new(s));
        match text.split_once("..") {
            Some((first, second)) => {
                if second.contains("..") {
                    return Err(UsageError::TooManyRevisions);
                }
                Self::from_specs(&[spec(first), spec(second)])
            }
            None => Self::from_specs(&[spec(text)]),
        }
    }

    /// Whether any revision was given.
    pub fn is_specified(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }

    /// The revision used as the old side, if any.
    pub fn first(&self) -> Option<&RevisionSpec> {
        match self {
            Self::Unspecified => None,
            Self::Single(first) | Self::Range(first, _) => Some(first),
        }
    }

    /// The revision used as the new side, if any.
    pub fn second(&self) -> Option<&RevisionSpec> {
        match self {
            Self::Range(_, second) => Some(second),
            Self::Unspecified | Self::Single(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn spec(s: &str) -> RevisionSpec {
        RevisionSpec::new(s)
    }

    #[test]
    fn test_from_specs() {
        assert_eq!(
            RevisionRequest::from_specs(&[]).unwrap(),
            RevisionRequest::Unspecified
        );
        assert_eq!(
            RevisionRequest::from_specs(&[Some(spec("1"))]).unwrap(),
            RevisionRequest::Single(spec("1"))
        );
        assert_eq!(
            RevisionRequest::from_specs(&[Some(spec("1")), None]).unwrap(),
            RevisionRequest::Single(spec("1"))
        );
        assert_eq!(
            RevisionRequest::from_specs(&[Some(spec("1")), Some(spec("2"))]).unwrap(),
            RevisionRequest::Range(spec("1"), spec("2"))
        );
        assert_matches!(
            RevisionRequest::from_specs(&[Some(spec("1")), Some(spec("2")), Some(spec("3"))]),
            Err(UsageError::TooManyRevisions)
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            RevisionRequest::parse("3").unwrap(),
            RevisionRequest::Single(spec("3"))
        );
        assert_eq!(
            RevisionRequest::parse("3..").unwrap(),
            RevisionRequest::Single(spec("3"))
        );
        assert_eq!(
            RevisionRequest::parse("1..4").unwrap(),
            RevisionRequest::Range(spec("1"), spec("4"))
        );
        assert_matches!(
            RevisionRequest::parse("..4"),
            Err(UsageError::MissingFirstRevision)
        );
        assert_matches!(
            RevisionRequest::parse("1..2..3"),
            Err(UsageError::TooManyRevisions)
        );
    }

    #[test]
    fn test_sides() {
        let request = RevisionRequest::Range(spec("1"), spec("2"));
        assert_eq!(request.first(), Some(&spec("1")));
        assert_eq!(request.second(), Some(&spec("2")));
        assert!(!RevisionRequest::Unspecified.is_specified());
        assert_eq!(RevisionRequest::Single(spec("1")).second(), None);
    }
}
