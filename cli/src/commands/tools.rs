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

use std::io::Write as _;

use extdiff_lib::tool::ToolConfig;
use extdiff_lib::tool::ToolKind;
use itertools::Itertools as _;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::command_error::CommandError;
use crate::ui::SharedUi;

/// List the known comparison tools
///
/// Includes the built-in tools and those defined in config files.
#[derive(clap::Args, Clone, Debug)]
pub struct ToolsArgs {}

#[instrument(skip_all)]
pub(crate) fn cmd_tools(
    ui: &SharedUi,
    command: &CommandHelper,
    _args: &ToolsArgs,
) -> Result<u8, CommandError> {
    let registry = command.registry();
    let mut ui = ui.borrow_mut();
    let out = ui.stdout();
    for name in registry.names() {
        writeln!(out, "{}", describe_tool(&registry.find(name)))?;
    }
    Ok(0)
}

fn describe_tool(config: &ToolConfig) -> String {
    let kind = match config.kind {
        ToolKind::Tree => "tree",
        ToolKind::List => "list",
    };
    let command = std::iter::once(config.program.as_str())
        .chain(config.options.iter().map(String::as_str))
        .join(" ");
    let mut line = format!("{}: {kind} ({command})", config.name);
    if !config.supports_cleanup {
        line.push_str(", keeps staged files");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_tool() {
        insta::assert_snapshot!(
            describe_tool(&ToolConfig::list("vim").with_options("-d")),
            @"vim: list (vim -d)"
        );
        insta::assert_snapshot!(
            describe_tool(&ToolConfig::tree("opendiff").without_cleanup()),
            @"opendiff: tree (opendiff), keeps staged files"
        );
    }
}
