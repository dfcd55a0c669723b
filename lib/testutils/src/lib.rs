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

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use extdiff_lib::compare::CompareRequest;
use extdiff_lib::delta::Diff;
use extdiff_lib::revision::RevisionRequest;
use extdiff_lib::tool::Comparator;
use extdiff_lib::tool::ComparatorFactory;
use extdiff_lib::tool::ToolConfig;
use extdiff_lib::tool::ToolError;
use extdiff_lib::tool::ToolOutcome;
use itertools::Itertools as _;
use tempfile::TempDir;

pub use crate::test_engine::LockLog;
pub use crate::test_engine::TestEngine;
pub use crate::test_engine::TreeBuilder;
pub use crate::test_engine::repo_path;

pub mod test_engine;

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("extdiff-test-")
        .tempdir()
        .unwrap()
}

pub fn compare_request(paths: &[&str], revisions: &str, tool_name: &str) -> CompareRequest {
    let revisions = if revisions.is_empty() {
        RevisionRequest::Unspecified
    } else {
        RevisionRequest::parse(revisions).unwrap()
    };
    CompareRequest {
        paths: paths.iter().map(|path| (*path).to_owned()).collect(),
        revisions,
        tool_name: tool_name.to_owned(),
        tool_options: None,
    }
}

/// Reads the files below `path` into a map keyed by relative path. A file
/// is read as a single entry keyed by `"."`.
pub fn read_contents(path: &Path) -> BTreeMap<String, String> {
    let mut contents = BTreeMap::new();
    if path.is_file() {
        contents.insert(".".to_owned(), fs::read_to_string(path).unwrap());
    } else if path.is_dir() {
        read_dir_into(path, "", &mut contents);
    }
    contents
}

fn read_dir_into(dir: &Path, prefix: &str, contents: &mut BTreeMap<String, String>) {
    let entries = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .sorted()
        .collect_vec();
    for entry in entries {
        let name = entry.file_name().unwrap().to_str().unwrap();
        let relative = format!("{prefix}{name}");
        if entry.is_dir() {
            read_dir_into(&entry, &format!("{relative}/"), contents);
        } else {
            contents.insert(relative, fs::read_to_string(&entry).unwrap());
        }
    }
}

/// What a [`RecordingComparator`] was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRun {
    pub tool: String,
    pub paths: Diff<PathBuf>,
    pub iteration: Option<Vec<String>>,
    /// Files visible at each path while the tool ran.
    pub contents: Diff<BTreeMap<String, String>>,
    /// Whether every file at each path was read-only.
    pub readonly: Diff<bool>,
    pub locks_held: usize,
}

fn all_readonly(path: &Path) -> bool {
    if path.is_dir() {
        fs::read_dir(path)
            .unwrap()
            .all(|entry| all_readonly(&entry.unwrap().path()))
    } else {
        fs::metadata(path).unwrap().permissions().readonly()
    }
}

/// Creates [`RecordingComparator`]s and collects what they were asked to do.
#[derive(Clone, Debug, Default)]
pub struct RecordingFactory {
    runs: Arc<Mutex<Vec<RecordedRun>>>,
    missing_programs: HashSet<String>,
    lock_log: LockLog,
    outcome: Option<ToolOutcome>,
}

impl RecordingFactory {
    pub fn new(lock_log: &LockLog) -> Self {
        Self {
            lock_log: lock_log.clone(),
            ..Self::default()
        }
    }

    /// Makes `program` fail the availability check.
    pub fn with_missing_program(mut self, program: &str) -> Self {
        self.missing_programs.insert(program.to_owned());
        self
    }

    /// Makes comparators report `outcome` instead of a clean exit.
    pub fn with_outcome(mut self, outcome: ToolOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl ComparatorFactory for RecordingFactory {
    fn check_available(&self, config: &ToolConfig) -> Result<(), ToolError> {
        if self.missing_programs.contains(&config.program) {
            Err(ToolError::NotFound {
                program: config.program.clone(),
                search_path: "/test/bin".to_owned(),
            })
        } else {
            Ok(())
        }
    }

    fn create(&self, config: ToolConfig) -> Box<dyn Comparator> {
        Box::new(RecordingComparator {
            config,
            runs: self.runs.clone(),
            lock_log: self.lock_log.clone(),
            outcome: self.outcome.unwrap_or(ToolOutcome::Exited(0)),
        })
    }
}

pub struct RecordingComparator {
    config: ToolConfig,
    runs: Arc<Mutex<Vec<RecordedRun>>>,
    lock_log: LockLog,
    outcome: ToolOutcome,
}

impl Comparator for RecordingComparator {
    fn run(
        &mut self,
        paths: Diff<&Path>,
        iteration: Option<&[String]>,
    ) -> Result<ToolOutcome, ToolError> {
        self.runs.lock().unwrap().push(RecordedRun {
            tool: self.config.name.clone(),
            paths: paths.map(Path::to_path_buf),
            iteration: iteration.map(<[String]>::to_vec),
            contents: paths.map(read_contents),
            readonly: paths.map(all_readonly),
            locks_held: self.lock_log.held(),
        });
        Ok(self.outcome)
    }
}

/// Fails if a `.rs` file in `test_dir` is neither a `[[test]]` target of the
/// parent manifest nor declared with `mod` in one.
pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let manifest_path = test_dir.parent().unwrap().join("Cargo.toml");
    let manifest = toml_edit::Document::parse(fs::read_to_string(manifest_path).unwrap()).unwrap();
    let targets = manifest
        .get("test")
        .and_then(|item| item.as_array_of_tables())
        .map(|tables| {
            tables
                .iter()
                .map(|table| table["name"].as_str().unwrap().to_owned())
                .collect_vec()
        })
        .unwrap_or_default();

    let mut declared: HashSet<String> = targets.iter().cloned().collect();
    for target in &targets {
        let text = fs::read_to_string(test_dir.join(target).with_extension("rs")).unwrap();
        declared.extend(text.lines().filter_map(|line| {
            let line = line.trim_start_matches("pub ").strip_prefix("mod ")?;
            Some(line.strip_suffix(';')?.trim().to_owned())
        }));
    }

    let forgotten = fs::read_dir(test_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|path| Some(path.file_stem()?.to_str()?.to_owned()))
        .filter(|stem| !declared.contains(stem))
        .sorted()
        .collect_vec();
    assert!(
        forgotten.is_empty(),
        "test files not declared as integration tests nor included in one: {}",
        forgotten.iter().map(|stem| format!("{stem}.rs")).join(", ")
    );
}
