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

use std::fs;
use std::io;
use std::path::PathBuf;

use clap::Parser as _;
use extdiff_cli::cli_util::Args;
use extdiff_cli::cli_util::run_with_args;
use extdiff_cli::command_error::CommandError;
use extdiff_cli::command_error::print_command_error;
use extdiff_cli::ui::SharedBuffer;
use extdiff_cli::ui::Ui;
use indoc::formatdoc;
use tempfile::TempDir;
use testutils::TestEngine;
use testutils::new_temp_dir;

/// Output of one command invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: u8,
}

/// Runs commands against a [`TestEngine`], with a `recorder` tool that
/// appends the contents of both sides to a record file.
pub struct CliTestEnvironment {
    pub engine: TestEngine,
    config_dir: TempDir,
}

impl CliTestEnvironment {
    pub fn new(engine: TestEngine) -> Self {
        let config_dir = new_temp_dir();
        let script = config_dir.path().join("recorder.sh");
        fs::write(
            &script,
            "cat \"$1\" \"$2\" >> \"$(dirname \"$0\")/record\"\n",
        )
        .unwrap();
        let config = formatdoc! {r#"
            [diff-tools.recorder]
            program = "sh"
            options = ["{script}"]
            "#,
            script = script.display(),
        };
        fs::write(config_dir.path().join("config.toml"), config).unwrap();
        Self { engine, config_dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.toml")
    }

    /// What the recorder tool saw, if it ran.
    pub fn recorded(&self) -> Option<String> {
        fs::read_to_string(self.config_dir.path().join("record")).ok()
    }

    /// Runs `args` from `cwd`, relative to the engine root, printing errors the
    /// way the command-line runner does.
    pub fn run(&self, cwd: &str, args: &[&str]) -> CommandOutput {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let ui = Ui::with_streams(
            Box::new(io::empty()),
            Box::new(stdout.clone()),
            Box::new(stderr.clone()),
            false,
        )
        .into_shared();
        let config_path = self.config_path();
        let full_args = ["extdiff", "--config-file", config_path.to_str().unwrap()]
            .into_iter()
            .chain(args.iter().copied());
        let args = Args::try_parse_from(full_args).unwrap();
        let cwd = self.engine.root().join(cwd);
        let status = match run_with_args(&ui, &self.engine, cwd, args) {
            Ok(status) => status,
            Err(err) => print_error(&mut ui.borrow_mut(), &err),
        };
        CommandOutput {
            stdout: stdout.contents(),
            stderr: stderr.contents(),
            status,
        }
    }
}

fn print_error(ui: &mut Ui, err: &CommandError) -> u8 {
    print_command_error(ui, err).unwrap();
    err.exit_code()
}
