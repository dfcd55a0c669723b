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

//! Runs a comparison from path arguments to tool invocation.

use std::fmt;
use std::path::PathBuf;

use itertools::Itertools as _;
use thiserror::Error;
use tracing::instrument;

use crate::delta::Delta;
use crate::delta::DeltaError;
use crate::delta::Diff;
use crate::delta::compute_delta;
use crate::engine::RepoEngine;
use crate::location::LocationResolver;
use crate::location::ResolutionError;
use crate::lock::ReadLocks;
use crate::plan::CompareMode;
use crate::plan::ComparisonPlan;
use crate::plan::Placement;
use crate::plan::PlannedSide;
use crate::plan::RevisionPairResolver;
use crate::plan::UsageError;
use crate::plan::check_usage;
use crate::revision::RevisionRequest;
use crate::staging::StagingArea;
use crate::staging::StagingError;
use crate::tool::ComparatorFactory;
use crate::tool::ToolConfig;
use crate::tool::ToolError;
use crate::tool::ToolOutcome;
use crate::tool::ToolRegistry;

/// Prefix of staging directory names.
pub const STAGING_PREFIX: &str = "extdiff-";

/// What the user asked to compare.
#[derive(Clone, Debug, Default)]
pub struct CompareRequest {
    /// Paths or branch locations. Empty means the current directory.
    pub paths: Vec<String>,
    /// Revisions to compare.
    pub revisions: RevisionRequest,
    /// Name of the tool to run.
    pub tool_name: String,
    /// Extra whitespace-separated tool options.
    pub tool_options: Option<String>,
}

/// Result of a comparison that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOutcome {
    /// The requested items are identical. No tool was run.
    NoDifferences,
    /// The tool was handed the two sides.
    Compared {
        /// What the tool reported. Not trusted for the exit code.
        tool: ToolOutcome,
    },
}

impl CompareOutcome {
    /// `0` if there was nothing to compare, `1` otherwise. The tool's own
    /// status is ignored since many tools exit with 0 either way.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoDifferences => 0,
            Self::Compared { .. } => 1,
        }
    }
}

/// Broad classes of [`CompareError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid combination of arguments.
    Usage,
    /// A path, branch or revision could not be resolved.
    Resolution,
    /// A staging area could not be prepared or removed.
    Staging,
    /// The tool is missing or could not be run.
    Tool,
}

/// Error from [`Dispatcher::compare()`].
#[derive(Debug, Error)]
pub enum CompareError {
    /// See [`ErrorCategory::Usage`].
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// See [`ErrorCategory::Resolution`].
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// See [`ErrorCategory::Staging`].
    #[error(transparent)]
    Staging(#[from] StagingError),
    /// See [`ErrorCategory::Tool`].
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl CompareError {
    /// Which class this error falls in.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Usage(_) => ErrorCategory::Usage,
            Self::Resolution(_) => ErrorCategory::Resolution,
            Self::Staging(_) => ErrorCategory::Staging,
            Self::Tool(_) => ErrorCategory::Tool,
        }
    }
}

/// Resolves requests against a repository engine and hands the result to
/// comparison tools.
pub struct Dispatcher<'a> {
    engine: &'a dyn RepoEngine,
    registry: &'a ToolRegistry,
    factory: &'a dyn ComparatorFactory,
    cwd: PathBuf,
    staging_dir: PathBuf,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher resolving relative paths against `cwd`, which
    /// must be absolute.
    pub fn new(
        engine: &'a dyn RepoEngine,
        registry: &'a ToolRegistry,
        factory: &'a dyn ComparatorFactory,
        cwd: PathBuf,
    ) -> Self {
        Self {
            engine,
            registry,
            factory,
            cwd,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Creates staging areas under `dir` instead of the system temporary
    /// directory.
    pub fn with_staging_dir(mut self, dir: PathBuf) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Compares the requested items.
    ///
    /// Repository locks are held only while resolving and are released before
    /// anything is staged or any tool runs. Staging areas are removed before
    /// returning, on success and on error.
    #[instrument(skip(self))]
    pub fn compare(&self, request: &CompareRequest) -> Result<CompareOutcome, CompareError> {
        let mut tool = self.registry.find(&request.tool_name);
        if let Some(options) = &request.tool_options {
            tool.add_options(options);
        }
        self.factory.check_available(&tool)?;

        let resolver = LocationResolver::new(self.engine, &self.cwd);
        let (first, remainder) = resolver.locate(&request.paths)?;
        let (second, remainder) = if remainder.is_empty() {
            (None, remainder)
        } else {
            let (second, remainder) = resolver.locate(remainder)?;
            (Some(second), remainder)
        };
        check_usage(second.is_some(), !remainder.is_empty(), &request.revisions)?;

        let trees = [Some(&first), second.as_ref()]
            .into_iter()
            .flatten()
            .map(|location| location.tree.clone())
            .collect_vec();
        let (plan, delta) = {
            let _locks = ReadLocks::acquire(trees).map_err(ResolutionError::from)?;
            let first = first.resolve_items(self.engine)?;
            let second = second
                .map(|location| location.resolve_items(self.engine))
                .transpose()?;
            let input_count = request.paths.len().max(1);
            let plan = RevisionPairResolver::new(
                &first,
                second.as_ref(),
                &request.revisions,
                input_count,
                tool.recursive,
            )
            .resolve()?;
            match delta_for_plan(&plan) {
                Ok(delta) => (plan, delta),
                Err(DeltaError::NoDifferences) => {
                    tracing::debug!("no differences found");
                    return Ok(CompareOutcome::NoDifferences);
                }
                Err(DeltaError::Engine(err)) => return Err(ResolutionError::from(err).into()),
            }
        };

        let outcome = self.run_tool(tool, &plan, &delta)?;
        Ok(CompareOutcome::Compared { tool: outcome })
    }

    fn run_tool(
        &self,
        tool: ToolConfig,
        plan: &ComparisonPlan,
        delta: &Delta,
    ) -> Result<ToolOutcome, CompareError> {
        let mut areas = vec![];
        let paths = Diff::new(
            self.side_path(&plan.sides.before, plan, &tool, &mut areas)?,
            self.side_path(&plan.sides.after, plan, &tool, &mut areas)?,
        );
        let iteration = match plan.mode {
            CompareMode::Iterative => Some(plan.iteration_list(delta)),
            CompareMode::SingleFile | CompareMode::Recursive => None,
        };
        tracing::debug!(?paths, ?iteration, mode = ?plan.mode, "running tool");

        let mut comparator = self.factory.create(tool);
        let outcome = comparator.run(
            Diff::new(paths.before.as_path(), paths.after.as_path()),
            iteration.as_deref(),
        )?;
        tracing::debug!(?outcome, "tool finished");
        for area in &mut areas {
            area.dispose()?;
        }
        Ok(outcome)
    }

    /// Returns the path handed to the tool for `side`, staging it first if
    /// needed.
    fn side_path(
        &self,
        side: &PlannedSide,
        plan: &ComparisonPlan,
        tool: &ToolConfig,
        areas: &mut Vec<StagingArea>,
    ) -> Result<PathBuf, StagingError> {
        match &side.placement {
            Placement::InPlace(path) => Ok(path.clone()),
            Placement::Staged { hint, items, path } => {
                let area = StagingArea::create_in(
                    &self.staging_dir,
                    STAGING_PREFIX,
                    hint,
                    tool.supports_cleanup,
                )?;
                // Dropped, and thus removed, if writing fails.
                area.materialize(side.snapshot.as_ref(), items, plan.layout)?;
                let path = path.to_fs_path(area.path());
                areas.push(area);
                Ok(path)
            }
        }
    }
}

fn delta_for_plan(plan: &ComparisonPlan) -> Result<Delta, DeltaError> {
    let trees = Diff::new(
        plan.sides.before.snapshot.as_ref(),
        plan.sides.after.snapshot.as_ref(),
    );
    let ids = Diff::new(
        plan.restriction.before.as_slice(),
        plan.restriction.after.as_slice(),
    );
    compute_delta(trees, ids)
}

impl fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cwd", &self.cwd)
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(CompareOutcome::NoDifferences.exit_code(), 0);
        assert_eq!(
            CompareOutcome::Compared {
                tool: ToolOutcome::Exited(0)
            }
            .exit_code(),
            1
        );
        assert_eq!(
            CompareOutcome::Compared {
                tool: ToolOutcome::Declined
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_error_category() {
        let err = CompareError::from(UsageError::TooManyBranches);
        assert_eq!(err.category(), ErrorCategory::Usage);
        let err = CompareError::from(ToolError::NotFound {
            program: "meld".to_owned(),
            search_path: String::new(),
        });
        assert_eq!(err.category(), ErrorCategory::Tool);
        insta::assert_snapshot!(err, @"Cannot find 'meld' in ");
    }
}
