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

mod diff;
mod tools;

use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::command_error::CommandError;
use crate::ui::SharedUi;

pub use self::diff::DiffArgs;
pub use self::tools::ToolsArgs;

#[derive(clap::Subcommand, Clone, Debug)]
pub enum Command {
    Diff(DiffArgs),
    Tools(ToolsArgs),
}

/// Runs `command`, returning the process exit status.
#[instrument(skip_all)]
pub fn run_command(
    ui: &SharedUi,
    command_helper: &CommandHelper,
    command: &Command,
) -> Result<u8, CommandError> {
    match command {
        Command::Diff(args) => diff::cmd_diff(ui, command_helper, args),
        Command::Tools(args) => tools::cmd_tools(ui, command_helper, args),
    }
}
