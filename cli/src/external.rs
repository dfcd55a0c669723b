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

//! Comparators backed by external programs.

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use extdiff_lib::delta::Diff;
use extdiff_lib::tool::Comparator;
use extdiff_lib::tool::ComparatorFactory;
use extdiff_lib::tool::ToolConfig;
use extdiff_lib::tool::ToolError;
use extdiff_lib::tool::ToolOutcome;
use extdiff_lib::tool::find_program;
use tempfile::NamedTempFile;

use crate::ui::SharedUi;

/// Creates [`ExternalComparator`]s looking programs up in `search_path`.
pub struct ExternalComparatorFactory {
    ui: SharedUi,
    search_path: Option<OsString>,
}

impl ExternalComparatorFactory {
    /// Looks programs up in `$PATH`.
    pub fn new(ui: SharedUi) -> Self {
        Self::with_search_path(ui, std::env::var_os("PATH"))
    }

    fn with_search_path(ui: SharedUi, search_path: Option<OsString>) -> Self {
        Self { ui, search_path }
    }
}

impl ComparatorFactory for ExternalComparatorFactory {
    fn check_available(&self, config: &ToolConfig) -> Result<(), ToolError> {
        find_program(&config.program, self.search_path.as_deref()).map(|_| ())
    }

    fn create(&self, config: ToolConfig) -> Box<dyn Comparator> {
        Box::new(ExternalComparator {
            config,
            ui: self.ui.clone(),
            search_path: self.search_path.clone(),
        })
    }
}

/// Runs `program <options...> <old> <new>`, once per entry of the iteration
/// list if there is one.
///
/// List tools get the new path first. Standard error of the program goes to a
/// temporary log, since graphical tools tend to be noisy.
pub struct ExternalComparator {
    config: ToolConfig,
    ui: SharedUi,
    search_path: Option<OsString>,
}

impl ExternalComparator {
    fn confirm(&self, count: usize) -> Result<bool, ToolError> {
        let mut ui = self.ui.borrow_mut();
        ui.status(&format!("There are {count} files with differences to review"))
            .map_err(ToolError::Prompt)?;
        ui.prompt_yes_no("Do you wish to continue?", Some(true))
            .map_err(ToolError::Prompt)
    }

    fn spawn(
        &self,
        program: &Path,
        paths: Diff<&Path>,
        log: &NamedTempFile,
    ) -> Result<i32, ToolError> {
        let spawn_error = |source| ToolError::Spawn {
            program: self.config.program.clone(),
            source,
        };
        let (first, second) = if self.config.swap_operands {
            (paths.after, paths.before)
        } else {
            (paths.before, paths.after)
        };
        let stderr = log.reopen().map_err(spawn_error)?;
        let mut cmd = Command::new(program);
        cmd.args(&self.config.options)
            .arg(first)
            .arg(second)
            .stderr(stderr);
        tracing::info!(?cmd, "running diff tool");
        let status = cmd.status().map_err(spawn_error)?;
        tracing::debug!(?status, "diff tool exited");
        // Killed by a signal.
        Ok(status.code().unwrap_or(-1))
    }
}

impl Comparator for ExternalComparator {
    fn run(
        &mut self,
        paths: Diff<&Path>,
        iteration: Option<&[String]>,
    ) -> Result<ToolOutcome, ToolError> {
        let program = find_program(&self.config.program, self.search_path.as_deref())?;
        if let Some(entries) = iteration
            && self.config.interactive
            && entries.len() > 1
            && !self.confirm(entries.len())?
        {
            return Ok(ToolOutcome::Declined);
        }

        let log = tempfile::Builder::new()
            .prefix("extdiff-")
            .suffix(".log")
            .tempfile()
            .map_err(|source| ToolError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        tracing::debug!(log = ?log.path(), "tool errors are logged");

        let Some(entries) = iteration else {
            let code = self.spawn(&program, paths, &log)?;
            return Ok(ToolOutcome::Exited(code));
        };
        let mut code = 0;
        for entry in entries {
            let joined = paths.map(|path| join_entry(path, entry));
            code = self.spawn(&program, joined.as_ref().map(PathBuf::as_path), &log)?;
        }
        Ok(ToolOutcome::Exited(code))
    }
}

/// Joins an iteration entry to a base path. `"."` names the base itself.
fn join_entry(base: &Path, entry: &str) -> PathBuf {
    if entry == "." {
        base.to_path_buf()
    } else {
        base.join(entry.strip_prefix("./").unwrap_or(entry))
    }
}
