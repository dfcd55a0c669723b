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

#![cfg(unix)]

use pretty_assertions::assert_eq;
use testutils::TestEngine;
use testutils::TreeBuilder;

use crate::common::CliTestEnvironment;

fn single_file_env(old: &str, new: &str) -> CliTestEnvironment {
    let mut engine = TestEngine::new();
    engine.add_branch(
        "work",
        &[TreeBuilder::new().file("a.txt", old)],
        Some(&TreeBuilder::new().file("a.txt", new)),
    );
    CliTestEnvironment::new(engine)
}

#[test]
fn test_diff_no_differences() {
    let env = single_file_env("one\n", "one\n");
    let output = env.run("work", &["diff", "--using", "recorder", "a.txt"]);
    assert_eq!(output.status, 0);
    insta::assert_snapshot!(output.stderr, @"No differences found.");
    assert_eq!(env.recorded(), None);
}

#[test]
fn test_diff_modified_file() {
    let env = single_file_env("one\n", "two\n");
    let output = env.run("work", &["diff", "--using", "recorder", "a.txt"]);
    assert_eq!(output.status, 1);
    assert_eq!(output.stderr, "");
    assert_eq!(env.recorded().as_deref(), Some("one\ntwo\n"));
}

#[test]
fn test_diff_revision_range() {
    let mut engine = TestEngine::new();
    let revisions = [
        TreeBuilder::new().file("a.txt", "first\n"),
        TreeBuilder::new().file("a.txt", "second\n"),
    ];
    engine.add_branch("work", &revisions, Some(&revisions[1]));
    let env = CliTestEnvironment::new(engine);
    let output = env.run("work", &["diff", "--using", "recorder", "-r", "1..2", "a.txt"]);
    assert_eq!(output.status, 1);
    assert_eq!(env.recorded().as_deref(), Some("first\nsecond\n"));
}

#[test]
fn test_diff_revisions_with_two_branches() {
    let mut engine = TestEngine::new();
    let tree = TreeBuilder::new().file("a.txt", "one\n");
    engine.add_branch("b1", &[tree.clone()], Some(&tree));
    engine.add_branch("b2", &[tree.clone()], Some(&tree));
    let env = CliTestEnvironment::new(engine);
    let output = env.run(
        "",
        &["diff", "--using", "recorder", "-r", "1", "b1/a.txt", "b2/a.txt"],
    );
    assert_eq!(output.status, 1);
    insta::assert_snapshot!(output.stderr, @"Error: Cannot specify -r with multiple branches");
    assert_eq!(env.engine.lock_log().acquired(), 0);
}

#[test]
fn test_diff_bad_revision_range() {
    let env = single_file_env("one\n", "two\n");
    let output = env.run("work", &["diff", "--using", "recorder", "-r", "..2"]);
    assert_eq!(output.status, 1);
    insta::assert_snapshot!(output.stderr, @"Error: --revision range must start with a revision");
}

#[test]
fn test_diff_unversioned_path() {
    let env = single_file_env("one\n", "two\n");
    let output = env.run("work", &["diff", "--using", "recorder", "missing.txt"]);
    assert_eq!(output.status, 1);
    assert!(output.stderr.starts_with("Error: "), "{}", output.stderr);
    assert_eq!(env.recorded(), None);
}

#[test]
fn test_diff_missing_tool() {
    let env = single_file_env("one\n", "two\n");
    let output = env.run(
        "work",
        &["diff", "--using", "extdiff-no-such-tool", "a.txt"],
    );
    assert_eq!(output.status, 1);
    assert!(
        output.stderr.ends_with(
            "Hint: Install extdiff-no-such-tool, or set `program` in the [diff-tools.<name>] \
             table of your config\n"
        ),
        "{}",
        output.stderr
    );
    assert_eq!(env.engine.lock_log().acquired(), 0);
}
