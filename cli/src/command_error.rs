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

use std::error;
use std::io;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use extdiff_lib::compare::CompareError;
use extdiff_lib::config::ConfigLoadError;
use extdiff_lib::plan::UsageError;
use extdiff_lib::tool::ToolError;
use itertools::Itertools as _;
use thiserror::Error;

use crate::ui::Ui;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandErrorKind {
    User,
    Config,
    Internal,
}

#[derive(Clone, Debug)]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub error: Arc<dyn error::Error + Send + Sync>,
    pub hints: Vec<String>,
}

impl CommandError {
    pub fn new(
        kind: CommandErrorKind,
        err: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            error: Arc::from(err.into()),
            hints: vec![],
        }
    }

    pub fn with_message(
        kind: CommandErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self::new(kind, ErrorWithMessage::new(message, source))
    }

    /// Returns error with the given `hint` appended.
    pub fn hinted(mut self, hint: impl Into<String>) -> Self {
        self.add_hint(hint);
        self
    }

    /// Appends `hint` to the error.
    pub fn add_hint(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self.kind {
            CommandErrorKind::User | CommandErrorKind::Config => 1,
            CommandErrorKind::Internal => 255,
        }
    }
}

/// Wraps error with user-visible message.
#[derive(Debug, Error)]
#[error("{message}")]
struct ErrorWithMessage {
    message: String,
    source: Box<dyn error::Error + Send + Sync>,
}

impl ErrorWithMessage {
    fn new(
        message: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
        }
    }
}

pub fn user_error(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> CommandError {
    CommandError::new(CommandErrorKind::User, err)
}

pub fn user_error_with_hint(
    err: impl Into<Box<dyn error::Error + Send + Sync>>,
    hint: impl Into<String>,
) -> CommandError {
    user_error(err).hinted(hint)
}

pub fn user_error_with_message(
    message: impl Into<String>,
    source: impl Into<Box<dyn error::Error + Send + Sync>>,
) -> CommandError {
    CommandError::with_message(CommandErrorKind::User, message, source)
}

pub fn config_error(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> CommandError {
    CommandError::new(CommandErrorKind::Config, err)
}

pub fn config_error_with_message(
    message: impl Into<String>,
    source: impl Into<Box<dyn error::Error + Send + Sync>>,
) -> CommandError {
    CommandError::with_message(CommandErrorKind::Config, message, source)
}

pub fn internal_error(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> CommandError {
    CommandError::new(CommandErrorKind::Internal, err)
}

pub fn internal_error_with_message(
    message: impl Into<String>,
    source: impl Into<Box<dyn error::Error + Send + Sync>>,
) -> CommandError {
    CommandError::with_message(CommandErrorKind::Internal, message, source)
}

impl From<io::Error> for CommandError {
    fn from(err: io::Error) -> Self {
        internal_error(err)
    }
}

impl From<UsageError> for CommandError {
    fn from(err: UsageError) -> Self {
        user_error(err)
    }
}

impl From<ConfigLoadError> for CommandError {
    fn from(err: ConfigLoadError) -> Self {
        let hint = match &err {
            ConfigLoadError::Read(_) => None,
            ConfigLoadError::Parse { source_path, .. }
            | ConfigLoadError::Type { source_path, .. } => source_path
                .as_ref()
                .map(|path| format!("Check the config file: {}", path.display())),
        };
        let mut cmd_err = config_error(err);
        cmd_err.hints.extend(hint);
        cmd_err
    }
}

impl From<ToolError> for CommandError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { ref program, .. } => {
                let hint = format!(
                    "Install {program}, or set `program` in the [diff-tools.<name>] table of \
                     your config"
                );
                user_error_with_hint(err, hint)
            }
            ToolError::Config(err) => err.into(),
            ToolError::NotADiffTool { .. } => config_error(err),
            ToolError::Spawn { .. } => user_error(err),
            ToolError::Prompt(_) => internal_error(err),
        }
    }
}

impl From<CompareError> for CommandError {
    fn from(err: CompareError) -> Self {
        match err {
            CompareError::Usage(err) => err.into(),
            CompareError::Resolution(err) => user_error(err),
            CompareError::Staging(err) => {
                internal_error_with_message("Failed to prepare files for comparison", err)
            }
            CompareError::Tool(err) => err.into(),
        }
    }
}

/// Prints `err` with its sources and hints.
pub fn print_command_error(ui: &mut Ui, err: &CommandError) -> io::Result<()> {
    let out = ui.stderr();
    writeln!(out, "Error: {}", err.error)?;
    print_error_sources(out, err.error.source())?;
    for hint in &err.hints {
        writeln!(out, "Hint: {hint}")?;
    }
    Ok(())
}

fn print_error_sources(
    out: &mut dyn io::Write,
    source: Option<&dyn error::Error>,
) -> io::Result<()> {
    let Some(err) = source else {
        return Ok(());
    };
    let sources = std::iter::successors(Some(err), |err| err.source()).collect_vec();
    if let [err] = sources[..] {
        writeln!(out, "Caused by: {err}")?;
    } else {
        writeln!(out, "Caused by:")?;
        for (i, err) in sources.iter().enumerate() {
            writeln!(out, "{}: {err}", i + 1)?;
        }
    }
    Ok(())
}

/// Maps the result of a command to the process exit status.
pub fn handle_command_result(ui: &mut Ui, result: Result<u8, CommandError>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if let Err(print_err) = print_command_error(ui, &err) {
                tracing::error!(?print_err, ?err, "failed to print error");
            }
            ExitCode::from(err.exit_code())
        }
    }
}
