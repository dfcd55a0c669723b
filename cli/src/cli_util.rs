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

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as _;
use extdiff_lib::config::ConfigLayer;
use extdiff_lib::engine::RepoEngine;
use extdiff_lib::tool::ToolRegistry;
use tracing::instrument;
use tracing_subscriber::prelude::*;

use crate::command_error::CommandError;
use crate::command_error::handle_command_result;
use crate::command_error::internal_error_with_message;
use crate::command_error::user_error_with_message;
use crate::commands::Command;
use crate::commands::run_command;
use crate::ui::SharedUi;
use crate::ui::Ui;

/// Environment variable naming an extra config file, loaded before the
/// `--config-file` arguments.
pub const CONFIG_ENV_VAR: &str = "EXTDIFF_CONFIG";

pub struct TracingSubscription {
    reload_log_filter: tracing_subscriber::reload::Handle<
        tracing_subscriber::EnvFilter,
        tracing_subscriber::Registry,
    >,
}

impl TracingSubscription {
    const ENV_VAR_NAME: &str = "EXTDIFF_LOG";

    /// Initializes tracing with the default configuration. This should be
    /// called as early as possible.
    pub fn init() -> Self {
        let filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(tracing::metadata::LevelFilter::ERROR.into())
            .with_env_var(Self::ENV_VAR_NAME)
            .from_env_lossy();
        let (filter, reload_log_filter) = tracing_subscriber::reload::Layer::new(filter);
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .init();
        Self { reload_log_filter }
    }

    pub fn enable_debug_logging(&self) -> Result<(), CommandError> {
        self.reload_log_filter
            .modify(|filter| {
                // Only our own crates log at DEBUG level.
                *filter = tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::metadata::LevelFilter::INFO.into())
                    .with_env_var(Self::ENV_VAR_NAME)
                    .from_env_lossy()
                    .add_directive(tracing::metadata::LevelFilter::DEBUG.into())
                    .add_directive("extdiff_lib=debug".parse().unwrap())
                    .add_directive("extdiff_cli=debug".parse().unwrap());
            })
            .map_err(|err| internal_error_with_message("failed to enable debug logging", err))?;
        tracing::info!("debug logging enabled");
        Ok(())
    }
}

/// Options shared by all commands.
#[derive(clap::Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Load tool definitions from this TOML file
    ///
    /// May be repeated. Later files override earlier ones.
    #[arg(long, value_name = "PATH", global = true)]
    pub config_file: Vec<PathBuf>,
}

/// Compare repository files with external diff tools
#[derive(clap::Parser, Clone, Debug)]
#[command(name = "extdiff", version)]
pub struct Args {
    #[command(flatten)]
    pub global_args: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// State shared by the command implementations.
pub struct CommandHelper<'a> {
    engine: &'a dyn RepoEngine,
    cwd: PathBuf,
    registry: ToolRegistry,
}

impl<'a> CommandHelper<'a> {
    pub fn new(engine: &'a dyn RepoEngine, cwd: PathBuf, registry: ToolRegistry) -> Self {
        Self {
            engine,
            cwd,
            registry,
        }
    }

    pub fn engine(&self) -> &'a dyn RepoEngine {
        self.engine
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl fmt::Debug for CommandHelper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHelper")
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

/// Builds the tool registry from the built-in tools and the given config
/// files, in order.
pub fn load_tool_registry(config_files: &[PathBuf]) -> Result<ToolRegistry, CommandError> {
    let mut registry = ToolRegistry::with_builtin_tools();
    for path in config_files {
        let layer = ConfigLayer::load_from_file(path.clone())?;
        registry.load_layer(&layer)?;
        tracing::debug!(?path, "loaded tool definitions");
    }
    Ok(registry)
}

/// Parses `args` and runs the command, printing nothing on failure.
///
/// Returns the exit status of a successful command.
#[instrument(skip_all)]
pub fn run_with_args(
    ui: &SharedUi,
    engine: &dyn RepoEngine,
    cwd: PathBuf,
    args: Args,
) -> Result<u8, CommandError> {
    let mut config_files: Vec<PathBuf> = std::env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .into_iter()
        .collect();
    config_files.extend(args.global_args.config_file.iter().cloned());
    let registry = load_tool_registry(&config_files)?;
    let helper = CommandHelper::new(engine, cwd, registry);
    run_command(ui, &helper, &args.command)
}

/// Runs the command line against the repository engine of the host.
pub struct CliRunner<'a> {
    tracing_subscription: TracingSubscription,
    engine: &'a dyn RepoEngine,
}

impl<'a> CliRunner<'a> {
    /// Initializes logging and returns a runner. This should be called as
    /// early as possible.
    pub fn init(engine: &'a dyn RepoEngine) -> Self {
        Self {
            tracing_subscription: TracingSubscription::init(),
            engine,
        }
    }

    /// Runs the process's command line.
    pub fn run(self) -> ExitCode {
        self.run_from(std::env::args_os())
    }

    pub fn run_from(self, args: impl IntoIterator<Item = OsString>) -> ExitCode {
        let args = match Args::try_parse_from(args) {
            Ok(args) => args,
            Err(err) => {
                // Help and version requests end up here too.
                if let Err(print_err) = err.print() {
                    tracing::error!(?print_err, "failed to print usage");
                }
                return ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(2));
            }
        };
        let ui = Ui::with_stdio().into_shared();
        let result = self.run_parsed(&ui, args);
        handle_command_result(&mut ui.borrow_mut(), result)
    }

    fn run_parsed(&self, ui: &SharedUi, args: Args) -> Result<u8, CommandError> {
        if args.global_args.debug {
            self.tracing_subscription.enable_debug_logging()?;
        }
        let cwd = std::env::current_dir()
            .map_err(|err| user_error_with_message("Could not determine current directory", err))?;
        run_with_args(ui, self.engine, cwd, args)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;

    use super::*;
    use crate::command_error::CommandErrorKind;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "extdiff",
            "diff",
            "--using",
            "meld",
            "-r",
            "1..2",
            "--config-file",
            "tools.toml",
            "--diff-options=-x -y",
            "a.txt",
        ])
        .unwrap();
        assert_eq!(args.global_args.config_file, [PathBuf::from("tools.toml")]);
        let Command::Diff(diff) = args.command else {
            panic!("unexpected command");
        };
        assert_eq!(diff.using, "meld");
        assert_eq!(diff.revision.as_deref(), Some("1..2"));
        assert_eq!(diff.diff_options.as_deref(), Some("-x -y"));
        assert_eq!(diff.paths, ["a.txt"]);
    }

    #[test]
    fn test_diff_requires_tool() {
        assert!(Args::try_parse_from(["extdiff", "diff", "a.txt"]).is_err());
    }

    #[test]
    fn test_load_tool_registry() {
        let temp_dir = testutils::new_temp_dir();
        let first = temp_dir.path().join("first.toml");
        let second = temp_dir.path().join("second.toml");
        fs::write(&first, "[diff-tools.meld]\nprogram = \"meld-1\"\n").unwrap();
        fs::write(&second, "[diff-tools.meld]\nprogram = \"meld-2\"\n").unwrap();
        let registry = load_tool_registry(&[first, second]).unwrap();
        assert_eq!(registry.find("meld").program, "meld-2");
        assert!(registry.contains("vimdiff"));
    }

    #[test]
    fn test_load_tool_registry_error() {
        let temp_dir = testutils::new_temp_dir();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[diff-tools.meld]\nkind = 3\n").unwrap();
        assert_matches!(
            load_tool_registry(&[path]),
            Err(CommandError { kind: CommandErrorKind::Config, .. })
        );
    }
}
