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

use std::sync::Arc;

use assert_matches::assert_matches;
use extdiff_lib::delta::Delta;
use extdiff_lib::delta::DeltaError;
use extdiff_lib::delta::Diff;
use extdiff_lib::delta::compute_delta;
use extdiff_lib::engine::ItemId;
use extdiff_lib::engine::RepoEngine as _;
use extdiff_lib::engine::Snapshot;
use extdiff_lib::revision::RevisionSpec;
use itertools::Itertools as _;
use testutils::TestEngine;
use testutils::TreeBuilder;
use testutils::repo_path;

/// Returns both revisions of a branch whose history is `old` then `new`.
fn two_revisions(old: TreeBuilder, new: TreeBuilder) -> (TestEngine, Diff<Arc<dyn Snapshot>>) {
    let mut engine = TestEngine::new();
    let root = engine.add_branch("work", &[old, new], None);
    let branch = engine
        .open_branch_containing(root.to_str().unwrap())
        .unwrap()
        .branch;
    let trees = Diff::new(
        branch
            .historical_snapshot(&RevisionSpec::new("1"))
            .unwrap()
            .snapshot,
        branch
            .historical_snapshot(&RevisionSpec::new("2"))
            .unwrap()
            .snapshot,
    );
    (engine, trees)
}

fn ids(values: &[&str]) -> Vec<ItemId> {
    values.iter().map(|value| ItemId::new(*value)).collect()
}

fn delta_for(
    trees: &Diff<Arc<dyn Snapshot>>,
    ids: &Diff<Vec<ItemId>>,
) -> Result<Delta, DeltaError> {
    compute_delta(
        Diff::new(trees.before.as_ref(), trees.after.as_ref()),
        Diff::new(ids.before.as_slice(), ids.after.as_slice()),
    )
}

#[test]
fn test_restricted_to_requested_items() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file("a", "1").file("b", "1"),
        TreeBuilder::new().file("a", "2").file("b", "2"),
    );
    let requested = ids(&["id:a"]);
    let delta = delta_for(&trees, &Diff::new(requested.clone(), requested)).unwrap();
    assert_eq!(delta.len(), 1);
    assert_eq!(
        delta.text_modified_paths().collect_vec(),
        [&repo_path("a")]
    );
}

#[test]
fn test_directory_includes_descendants() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new()
            .file("dir/a", "1")
            .file("dir/sub/b", "1")
            .file("top", "1"),
        TreeBuilder::new()
            .file("dir/a", "2")
            .file("dir/sub/b", "2")
            .file("top", "2"),
    );
    let requested = ids(&["id:dir"]);
    let delta = delta_for(&trees, &Diff::new(requested.clone(), requested)).unwrap();
    assert_eq!(
        delta.text_modified_paths().collect_vec(),
        [&repo_path("dir/a"), &repo_path("dir/sub/b")]
    );
}

#[test]
fn test_identical_items() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file("a", "1").file("b", "1"),
        TreeBuilder::new().file("a", "1").file("b", "2"),
    );
    let requested = ids(&["id:a"]);
    assert_matches!(
        delta_for(&trees, &Diff::new(requested.clone(), requested)),
        Err(DeltaError::NoDifferences)
    );
}

#[test]
fn test_items_absent_from_both_sides() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file("a", "1"),
        TreeBuilder::new().file("a", "2"),
    );
    let requested = ids(&["id:gone"]);
    assert_matches!(
        delta_for(&trees, &Diff::new(requested.clone(), requested)),
        Err(DeltaError::NoDifferences)
    );
}

#[test]
fn test_removed_item_located_in_old_tree() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file("a", "1").file("b", "1"),
        TreeBuilder::new().file("b", "1"),
    );
    let requested = ids(&["id:a"]);
    let delta = delta_for(&trees, &Diff::new(requested.clone(), requested)).unwrap();
    assert_eq!(delta.removed.len(), 1);
    assert_eq!(delta.removed[0].path, repo_path("a"));
    assert_eq!(delta.text_modified_paths().count(), 0);
}

#[test]
fn test_renamed_item_matches_either_path() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file_with_id("old", "x", "1"),
        TreeBuilder::new().file_with_id("new", "x", "2"),
    );
    let requested = ids(&["x"]);
    let delta = delta_for(&trees, &Diff::new(requested.clone(), requested)).unwrap();
    assert_eq!(delta.renamed.len(), 1);
    assert_eq!(delta.renamed[0].old_path, repo_path("old"));
    assert_eq!(delta.renamed[0].new_path, repo_path("new"));
    assert!(delta.renamed[0].text_changed);
}

#[test]
fn test_sides_use_their_own_items() {
    let (_engine, trees) = two_revisions(
        TreeBuilder::new().file("a", "1").file("b", "1"),
        TreeBuilder::new().file("a", "2").file("b", "2"),
    );
    let delta = delta_for(&trees, &Diff::new(ids(&["id:a"]), ids(&["id:b"]))).unwrap();
    assert_eq!(
        delta.text_modified_paths().collect_vec(),
        [&repo_path("a"), &repo_path("b")]
    );
}
