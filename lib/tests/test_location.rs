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

use assert_matches::assert_matches;
use extdiff_lib::engine::EngineError;
use extdiff_lib::engine::ItemId;
use extdiff_lib::location::LocationResolver;
use extdiff_lib::location::ResolutionError;
use extdiff_lib::location::TreeAccess;
use extdiff_lib::repo_path::RepoPathBuf;
use testutils::TestEngine;
use testutils::TreeBuilder;
use testutils::repo_path;

const REMOTE_URL: &str = "http://example.com/repo";

fn engine_with_branches() -> TestEngine {
    let mut engine = TestEngine::new();
    let tree = TreeBuilder::new().file("a.txt", "1").file("dir/b.txt", "1");
    engine.add_branch("b1", &[tree.clone()], Some(&tree));
    engine.add_branch("b2", &[tree.clone()], None);
    engine.add_remote_branch(REMOTE_URL, "upstream", &[tree]);
    engine
}

fn inputs(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[test]
fn test_empty_inputs_use_cwd() {
    let engine = engine_with_branches();
    let cwd = engine.root().join("b1/dir");
    let resolver = LocationResolver::new(&engine, &cwd);
    let (location, remainder) = resolver.locate(&[]).unwrap();
    assert!(remainder.is_empty());
    assert!(location.is_working_copy());
    assert_eq!(location.paths, [repo_path("dir")]);
    assert_eq!(location.inputs, [cwd.to_str().unwrap()]);
}

#[test]
fn test_consumes_paths_of_same_working_copy() {
    let engine = engine_with_branches();
    let cwd = engine.root().join("b1");
    let resolver = LocationResolver::new(&engine, &cwd);
    let args = inputs(&["a.txt", "dir/b.txt", "../b2/a.txt"]);
    let (location, remainder) = resolver.locate(&args).unwrap();
    assert_eq!(
        location.access,
        TreeAccess::WorkingCopy {
            root: engine.root().join("b1")
        }
    );
    assert_eq!(location.paths, [repo_path("a.txt"), repo_path("dir/b.txt")]);
    assert_eq!(location.inputs, ["a.txt", "dir/b.txt"]);
    assert_eq!(remainder, ["../b2/a.txt"]);

    let (second, remainder) = resolver.locate(remainder).unwrap();
    assert!(remainder.is_empty());
    assert_eq!(
        second.access,
        TreeAccess::Repository {
            root: engine.root().join("b2")
        }
    );
    assert!(second.working_copy_root().is_none());
    assert_eq!(second.paths, [repo_path("a.txt")]);
}

#[test]
fn test_branch_root_is_root_path() {
    let engine = engine_with_branches();
    let cwd = engine.root().to_path_buf();
    let resolver = LocationResolver::new(&engine, &cwd);
    let (location, _) = resolver.locate(&inputs(&["b1"])).unwrap();
    assert_eq!(location.paths, [RepoPathBuf::root()]);
}

#[test]
fn test_remote_inputs() {
    let engine = engine_with_branches();
    let cwd = engine.root().to_path_buf();
    let resolver = LocationResolver::new(&engine, &cwd);
    let args = inputs(&[
        &format!("{REMOTE_URL}/a.txt"),
        &format!("{REMOTE_URL}/dir/b.txt"),
        "b1/a.txt",
    ]);
    let (location, remainder) = resolver.locate(&args).unwrap();
    assert_eq!(location.access, TreeAccess::Remote);
    assert_eq!(location.paths, [repo_path("a.txt"), repo_path("dir/b.txt")]);
    assert_eq!(remainder, ["b1/a.txt"]);
}

#[test]
fn test_local_then_remote() {
    let engine = engine_with_branches();
    let cwd = engine.root().to_path_buf();
    let resolver = LocationResolver::new(&engine, &cwd);
    let args = inputs(&["b1/a.txt", &format!("{REMOTE_URL}/a.txt")]);
    let (location, remainder) = resolver.locate(&args).unwrap();
    assert_eq!(location.paths, [repo_path("a.txt")]);
    assert_eq!(remainder.len(), 1);
}

#[test]
fn test_not_a_branch() {
    let engine = engine_with_branches();
    let cwd = engine.root().to_path_buf();
    let resolver = LocationResolver::new(&engine, &cwd);
    assert_matches!(
        resolver.locate(&inputs(&["nowhere/a.txt"])),
        Err(ResolutionError::Engine(EngineError::NotBranch { .. }))
    );
    assert_matches!(
        resolver.locate(&inputs(&["https://elsewhere.example.com/x"])),
        Err(ResolutionError::Engine(EngineError::NotBranch { .. }))
    );
}

#[test]
fn test_resolve_items() {
    let engine = engine_with_branches();
    let cwd = engine.root().join("b1");
    let resolver = LocationResolver::new(&engine, &cwd);
    let (location, _) = resolver.locate(&inputs(&["dir/b.txt", "a.txt"])).unwrap();
    let items = location.resolve_items(&engine).unwrap();
    assert_eq!(
        items.ids,
        [ItemId::new("id:dir/b.txt"), ItemId::new("id:a.txt")]
    );
    assert_eq!(items.focus(), &ItemId::new("id:dir/b.txt"));
    assert_eq!(items.focus_path(), &repo_path("dir/b.txt"));
    // Resolution does not lock by itself.
    assert_eq!(engine.lock_log().acquired(), 0);
}

#[test]
fn test_resolve_untracked_items() {
    let engine = engine_with_branches();
    let cwd = engine.root().to_path_buf();
    let resolver = LocationResolver::new(&engine, &cwd);

    let (location, _) = resolver.locate(&inputs(&["b1/missing.txt"])).unwrap();
    assert_matches!(
        location.resolve_items(&engine),
        Err(ResolutionError::Engine(EngineError::NotVersioned { path })) if path == "b1/missing.txt"
    );

    let (location, _) = resolver
        .locate(&inputs(&[&format!("{REMOTE_URL}/missing.txt")]))
        .unwrap();
    assert_matches!(
        location.resolve_items(&engine),
        Err(ResolutionError::Engine(EngineError::PathNotChild { base, .. })) if base == REMOTE_URL
    );
}
