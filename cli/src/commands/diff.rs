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

use extdiff_lib::compare::CompareOutcome;
use extdiff_lib::compare::CompareRequest;
use extdiff_lib::compare::Dispatcher;
use extdiff_lib::plan::UsageError;
use extdiff_lib::revision::RevisionRequest;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::command_error::CommandError;
use crate::external::ExternalComparatorFactory;
use crate::ui::SharedUi;

/// Show differences in an external tool
///
/// Without `-r`, compares the working copy against its basis revision. With
/// one revision, compares that revision against the working copy (or the
/// branch tip if there is no working copy). With `A..B`, compares the two
/// revisions.
///
/// Paths from two different branches compare the branches against each
/// other. Branches may be local directories or URLs.
///
/// Exits with 0 if there were no differences, and 1 otherwise.
#[derive(clap::Args, Clone, Debug)]
pub struct DiffArgs {
    /// Files, directories or branch locations to compare
    ///
    /// Defaults to the current directory.
    #[arg(value_name = "PATHS", value_hint = clap::ValueHint::AnyPath)]
    pub(crate) paths: Vec<String>,

    /// Revision to compare against, or a range `A..B`
    #[arg(long, short, value_name = "REVISION")]
    pub(crate) revision: Option<String>,

    /// Name of the comparison tool to run
    #[arg(long, value_name = "TOOL")]
    pub(crate) using: String,

    /// Extra options passed to the tool, separated by whitespace
    #[arg(long, value_name = "OPTIONS", allow_hyphen_values = true)]
    pub(crate) diff_options: Option<String>,
}

impl DiffArgs {
    fn to_request(&self) -> Result<CompareRequest, UsageError> {
        let revisions = match &self.revision {
            Some(text) => RevisionRequest::parse(text)?,
            None => RevisionRequest::Unspecified,
        };
        Ok(CompareRequest {
            paths: self.paths.clone(),
            revisions,
            tool_name: self.using.clone(),
            tool_options: self.diff_options.clone(),
        })
    }
}

#[instrument(skip_all)]
pub(crate) fn cmd_diff(
    ui: &SharedUi,
    command: &CommandHelper,
    args: &DiffArgs,
) -> Result<u8, CommandError> {
    let request = args.to_request()?;
    let factory = ExternalComparatorFactory::new(ui.clone());
    let dispatcher = Dispatcher::new(
        command.engine(),
        command.registry(),
        &factory,
        command.cwd().to_path_buf(),
    );
    let outcome = dispatcher.compare(&request)?;
    match outcome {
        CompareOutcome::NoDifferences => {
            ui.borrow_mut().status("No differences found.")?;
            Ok(0)
        }
        CompareOutcome::Compared { tool } => {
            tracing::debug!(?tool, "comparison finished");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::Parser as _;
    use extdiff_lib::revision::RevisionSpec;

    use super::*;

    #[derive(clap::Parser, Debug)]
    struct TestArgs {
        #[command(flatten)]
        diff: DiffArgs,
    }

    fn parse(args: &[&str]) -> DiffArgs {
        TestArgs::try_parse_from(std::iter::once("diff").chain(args.iter().copied()))
            .unwrap()
            .diff
    }

    #[test]
    fn test_request_without_revision() {
        let request = parse(&["--using", "meld", "a.txt", "b.txt"])
            .to_request()
            .unwrap();
        assert_eq!(request.paths, ["a.txt", "b.txt"]);
        assert_eq!(request.revisions, RevisionRequest::Unspecified);
        assert_eq!(request.tool_name, "meld");
        assert_eq!(request.tool_options, None);
    }

    #[test]
    fn test_request_with_range() {
        let request = parse(&["--using", "vimdiff", "-r", "1..3", "--diff-options", "-R"])
            .to_request()
            .unwrap();
        assert_eq!(
            request.revisions,
            RevisionRequest::Range(RevisionSpec::new("1"), RevisionSpec::new("3"))
        );
        assert_eq!(request.tool_options.as_deref(), Some("-R"));
    }

    #[test]
    fn test_request_with_bad_range() {
        assert_matches!(
            parse(&["--using", "meld", "-r", "..3"]).to_request(),
            Err(UsageError::MissingFirstRevision)
        );
        assert_matches!(
            parse(&["--using", "meld", "-r", "1..2..3"]).to_request(),
            Err(UsageError::TooManyRevisions)
        );
    }
}
