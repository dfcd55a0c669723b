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

//! External comparison tools: configuration, registry and the interface used
//! to run them.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigLayer;
use crate::config::ConfigLoadError;
use crate::delta::Diff;

/// How a tool consumes its inputs.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Takes two directories and walks them itself.
    Tree,
    /// Takes two files at a time.
    List,
}

/// Settings of one comparison tool.
///
/// Values are always constructed fresh from a template by
/// [`ToolRegistry::find()`], so mutating one never affects later lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
    /// Name the tool is looked up by.
    pub name: String,
    /// Program to execute.
    pub program: String,
    /// How the tool consumes its inputs.
    pub kind: ToolKind,
    /// Arguments inserted before the two paths.
    pub options: Vec<String>,
    /// The tool descends into directories itself.
    pub recursive: bool,
    /// The tool is interactive, so the user is asked before opening many
    /// files.
    pub interactive: bool,
    /// Staging areas may be removed once the tool exits.
    pub supports_cleanup: bool,
    /// The tool shows differences (as opposed to, say, a merge tool).
    pub performs_own_diff: bool,
    /// Pass the new path before the old one.
    pub swap_operands: bool,
}

impl ToolConfig {
    /// Default settings for a tool of the given kind.
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        let name = name.into();
        let is_tree = kind == ToolKind::Tree;
        Self {
            program: name.clone(),
            name,
            kind,
            options: vec![],
            recursive: is_tree,
            interactive: true,
            supports_cleanup: true,
            performs_own_diff: true,
            swap_operands: !is_tree,
        }
    }

    /// Default settings for a recursive tree tool.
    pub fn tree(name: impl Into<String>) -> Self {
        Self::new(name, ToolKind::Tree)
    }

    /// Default settings for a file-by-file tool.
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, ToolKind::List)
    }

    /// Sets the options from whitespace-separated text.
    pub fn with_options(mut self, options: &str) -> Self {
        self.options = split_options(options);
        self
    }

    /// Disables removal of staging areas.
    pub fn without_cleanup(mut self) -> Self {
        self.supports_cleanup = false;
        self
    }

    /// Appends whitespace-separated options.
    pub fn add_options(&mut self, options: &str) {
        self.options.extend(split_options(options));
    }
}

fn split_options(options: &str) -> Vec<String> {
    options.split_whitespace().map(str::to_owned).collect()
}

/// Error from looking up, preparing or running a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is not installed.
    #[error("Cannot find '{program}' in {search_path}")]
    NotFound {
        /// Program that was searched for.
        program: String,
        /// The search path, as in `$PATH`.
        search_path: String,
    },
    /// Tool definitions could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    /// Only tools that compare files can be registered.
    #[error("The tool `{name}` does not show differences and cannot be used for diffs")]
    NotADiffTool {
        /// Name of the rejected tool.
        name: String,
    },
    /// The process could not be started.
    #[error("Failed to run external tool '{program}'")]
    Spawn {
        /// Program that was run.
        program: String,
        /// Source error.
        #[source]
        source: io::Error,
    },
    /// The confirmation prompt could not be shown or answered.
    #[error("Failed to prompt for confirmation")]
    Prompt(#[source] io::Error),
}

/// Result of handing a pair of paths to a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool ran. The status is the last process's exit code.
    Exited(i32),
    /// The user declined to open the tool. Nothing was run.
    Declined,
}

/// A comparison tool ready to run.
pub trait Comparator {
    /// Compares `paths.before` against `paths.after`.
    ///
    /// With `iteration`, the tool is run once per entry, with both paths
    /// joined with the entry. Recursive tools are never given a list.
    fn run(
        &mut self,
        paths: Diff<&Path>,
        iteration: Option<&[String]>,
    ) -> Result<ToolOutcome, ToolError>;
}

/// Creates [`Comparator`]s from settings.
pub trait ComparatorFactory {
    /// Checks that the tool can be run at all. Called before anything is
    /// staged.
    fn check_available(&self, config: &ToolConfig) -> Result<(), ToolError> {
        let search_path = std::env::var_os("PATH");
        find_program(&config.program, search_path.as_deref()).map(|_| ())
    }

    /// Creates a comparator for `config`.
    fn create(&self, config: ToolConfig) -> Box<dyn Comparator>;
}

/// Looks up `program` in `search_path`. A program given with a directory
/// component is checked as is.
pub fn find_program(program: &str, search_path: Option<&OsStr>) -> Result<PathBuf, ToolError> {
    let program_path = Path::new(program);
    if program_path.components().count() > 1 {
        if program_path.is_file() {
            return Ok(program_path.to_path_buf());
        }
    } else if let Some(search_path) = search_path {
        let found = std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file());
        if let Some(found) = found {
            return Ok(found);
        }
    }
    Err(ToolError::NotFound {
        program: program.to_owned(),
        search_path: search_path
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })
}

/// Known tools, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    templates: BTreeMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Creates a registry without any tool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the common diff viewers.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for config in builtin_tools() {
            registry.templates.insert(config.name.clone(), config);
        }
        registry
    }

    /// Adds or replaces a template. The last registration of a name wins.
    pub fn register(&mut self, config: ToolConfig) -> Result<(), ToolError> {
        if !config.performs_own_diff {
            return Err(ToolError::NotADiffTool { name: config.name });
        }
        self.templates.insert(config.name.clone(), config);
        Ok(())
    }

    /// Applies the `[diff-tools]` definitions of `layer` on top of the
    /// current templates.
    pub fn load_layer(&mut self, layer: &ConfigLayer) -> Result<(), ToolError> {
        for (name, definition) in layer.tool_definitions()? {
            let base = self.templates.get(&name).cloned();
            self.register(definition.apply(&name, base))?;
        }
        Ok(())
    }

    /// Whether `name` has a template.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Names of all templates, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Constructs fresh settings for `name`. Unknown names get the defaults of
    /// a tree tool running the program of the same name.
    pub fn find(&self, name: &str) -> ToolConfig {
        match self.templates.get(name) {
            Some(template) => template.clone(),
            None => ToolConfig::tree(name),
        }
    }
}

fn builtin_tools() -> Vec<ToolConfig> {
    vec![
        ToolConfig::tree("fldiff"),
        ToolConfig::list("gvim").with_options("-f -d"),
        ToolConfig::list("gvimdiff").with_options("-f"),
        ToolConfig::tree("kdiff3"),
        ToolConfig::tree("kompare"),
        ToolConfig::tree("meld"),
        ToolConfig::list("mgdiff"),
        // Returns immediately and reads the files later.
        ToolConfig::tree("opendiff").without_cleanup(),
        ToolConfig::list("tkdiff"),
        ToolConfig::list("vim").with_options("-d"),
        ToolConfig::list("vimdiff"),
        ToolConfig::tree("xxdiff").with_options("--exclude=.bzr*"),
    ]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;
    use test_case::test_case;

    use super::*;
    use crate::tests::new_temp_dir;

    #[test_case("meld", ToolKind::Tree, true, false; "tree tool")]
    #[test_case("vimdiff", ToolKind::List, false, true; "list tool")]
    #[test_case("unknown-tool", ToolKind::Tree, true, false; "unknown tool")]
    fn test_find_defaults(name: &str, kind: ToolKind, recursive: bool, swap: bool) {
        let registry = ToolRegistry::with_builtin_tools();
        let config = registry.find(name);
        assert_eq!(config.program, name);
        assert_eq!(config.kind, kind);
        assert_eq!(config.recursive, recursive);
        assert_eq!(config.swap_operands, swap);
        assert!(config.interactive);
        assert!(config.performs_own_diff);
    }

    #[test]
    fn test_builtin_options() {
        let registry = ToolRegistry::with_builtin_tools();
        assert_eq!(registry.find("gvim").options, ["-f", "-d"]);
        assert_eq!(registry.find("xxdiff").options, ["--exclude=.bzr*"]);
        assert!(!registry.find("opendiff").supports_cleanup);
        assert!(registry.find("meld").supports_cleanup);
    }

    #[test]
    fn test_find_returns_fresh_value() {
        let registry = ToolRegistry::with_builtin_tools();
        let mut config = registry.find("vim");
        config.add_options("-R  -n");
        assert_eq!(config.options, ["-d", "-R", "-n"]);
        assert_eq!(registry.find("vim").options, ["-d"]);
    }

    #[test]
    fn test_register_rejects_non_diff_tool() {
        let mut registry = ToolRegistry::new();
        let mut config = ToolConfig::tree("merger");
        config.performs_own_diff = false;
        assert_matches!(
            registry.register(config),
            Err(ToolError::NotADiffTool { name }) if name == "merger"
        );
        assert!(!registry.contains("merger"));
    }

    #[test]
    fn test_find_program() {
        let temp_dir = new_temp_dir();
        let program = temp_dir.path().join("mydiff");
        fs::write(&program, "").unwrap();
        let search_path = std::env::join_paths([temp_dir.path()]).unwrap();

        assert_eq!(
            find_program("mydiff", Some(&search_path)).unwrap(),
            program
        );
        assert_eq!(
            find_program(program.to_str().unwrap(), None).unwrap(),
            program
        );
        assert_matches!(
            find_program("otherdiff", Some(&search_path)),
            Err(ToolError::NotFound { program, .. }) if program == "otherdiff"
        );
        assert_matches!(
            find_program("mydiff", None),
            Err(ToolError::NotFound { search_path, .. }) if search_path.is_empty()
        );
    }
}
