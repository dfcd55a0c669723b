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

use std::any::Any;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fs;
use std::io::Cursor;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use extdiff_lib::delta::Delta;
use extdiff_lib::delta::DeltaEntry;
use extdiff_lib::delta::RenamedEntry;
use extdiff_lib::engine::Branch;
use extdiff_lib::engine::BranchMatch;
use extdiff_lib::engine::EngineError;
use extdiff_lib::engine::EngineResult;
use extdiff_lib::engine::HistoricalSnapshot;
use extdiff_lib::engine::ItemId;
use extdiff_lib::engine::ItemKind;
use extdiff_lib::engine::RepoEngine;
use extdiff_lib::engine::Snapshot;
use extdiff_lib::engine::WorkingCopyMatch;
use extdiff_lib::file_util::path_within;
use extdiff_lib::repo_path::RepoPathBuf;
use extdiff_lib::revision::RevisionSpec;
use tempfile::TempDir;

use crate::new_temp_dir;

const ROOT_ID: &str = "root";

#[derive(Clone, Debug, PartialEq, Eq)]
struct TreeEntry {
    id: ItemId,
    kind: ItemKind,
    content: Vec<u8>,
}

/// Describes the content of a tree.
///
/// Items get an identifier derived from their path unless one is given, so
/// the same path in two trees or two branches is the same item.
#[derive(Clone, Debug)]
pub struct TreeBuilder {
    entries: BTreeMap<RepoPathBuf, TreeEntry>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let root = TreeEntry {
            id: ItemId::new(ROOT_ID),
            kind: ItemKind::Directory,
            content: vec![],
        };
        Self {
            entries: BTreeMap::from([(RepoPathBuf::root(), root)]),
        }
    }

    pub fn file(self, path: &str, content: &str) -> Self {
        self.file_with_id(path, &format!("id:{path}"), content)
    }

    pub fn file_with_id(mut self, path: &str, id: &str, content: &str) -> Self {
        let path = repo_path(path);
        self.add_parents(&path);
        self.entries.insert(
            path,
            TreeEntry {
                id: ItemId::new(id),
                kind: ItemKind::File,
                content: content.as_bytes().to_vec(),
            },
        );
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        let path = repo_path(path);
        self.add_parents(&path);
        self.insert_dir(path);
        self
    }

    fn add_parents(&mut self, path: &RepoPathBuf) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            parent = dir.parent();
            self.insert_dir(dir);
        }
    }

    fn insert_dir(&mut self, path: RepoPathBuf) {
        if path.is_root() {
            return;
        }
        let id = ItemId::new(format!("id:{path}"));
        self.entries.entry(path).or_insert(TreeEntry {
            id,
            kind: ItemKind::Directory,
            content: vec![],
        });
    }
}

pub fn repo_path(value: &str) -> RepoPathBuf {
    RepoPathBuf::from_internal_string(value).unwrap()
}

/// Counts read locks across all snapshots of one engine.
#[derive(Clone, Debug, Default)]
pub struct LockLog {
    state: Arc<Mutex<LockState>>,
}

#[derive(Debug, Default)]
struct LockState {
    held: usize,
    acquired: usize,
}

impl LockLog {
    /// Number of locks currently held.
    pub fn held(&self) -> usize {
        self.state.lock().unwrap().held
    }

    /// Number of locks taken so far.
    pub fn acquired(&self) -> usize {
        self.state.lock().unwrap().acquired
    }

    fn lock(&self) {
        let mut state = self.state.lock().unwrap();
        state.held += 1;
        state.acquired += 1;
    }

    fn unlock(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.held > 0, "unlocked more often than locked");
        state.held -= 1;
    }
}

pub struct TestSnapshot {
    label: String,
    entries: BTreeMap<RepoPathBuf, TreeEntry>,
    lock_log: LockLog,
}

impl Debug for TestSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TestSnapshot").field(&self.label).finish()
    }
}

impl TestSnapshot {
    fn new(label: String, tree: &TreeBuilder, lock_log: LockLog) -> Self {
        Self {
            label,
            entries: tree.entries.clone(),
            lock_log,
        }
    }

    fn entry_by_id(&self, id: &ItemId) -> Option<(&RepoPathBuf, &TreeEntry)> {
        self.entries.iter().find(|(_, entry)| entry.id == *id)
    }

    fn by_id(&self) -> HashMap<&ItemId, (&RepoPathBuf, &TreeEntry)> {
        self.entries
            .iter()
            .filter(|(path, _)| !path.is_root())
            .map(|(path, entry)| (&entry.id, (path, entry)))
            .collect()
    }

    fn write_to(&self, dir: &Path) -> std::io::Result<()> {
        for (path, entry) in &self.entries {
            let disk_path = path.to_fs_path(dir);
            match entry.kind {
                ItemKind::Directory => fs::create_dir_all(disk_path)?,
                ItemKind::File => fs::write(disk_path, &entry.content)?,
            }
        }
        Ok(())
    }
}

impl Snapshot for TestSnapshot {
    fn identifier_for_path(&self, path: &RepoPathBuf) -> EngineResult<Option<ItemId>> {
        Ok(self.entries.get(path).map(|entry| entry.id.clone()))
    }

    fn path_for_identifier(&self, id: &ItemId) -> EngineResult<RepoPathBuf> {
        self.entry_by_id(id)
            .map(|(path, _)| path.clone())
            .ok_or_else(|| EngineError::NoSuchItem { id: id.clone() })
    }

    fn has_identifier(&self, id: &ItemId) -> bool {
        self.entry_by_id(id).is_some()
    }

    fn kind(&self, id: &ItemId) -> EngineResult<ItemKind> {
        self.entry_by_id(id)
            .map(|(_, entry)| entry.kind)
            .ok_or_else(|| EngineError::NoSuchItem { id: id.clone() })
    }

    fn export_to(&self, dir: &Path) -> EngineResult<()> {
        self.write_to(dir)
            .map_err(|err| EngineError::Other(err.into()))
    }

    fn read_file(&self, id: &ItemId) -> EngineResult<Box<dyn Read + '_>> {
        let (_, entry) = self
            .entry_by_id(id)
            .ok_or_else(|| EngineError::NoSuchItem { id: id.clone() })?;
        Ok(Box::new(Cursor::new(entry.content.as_slice())))
    }

    fn changes_from(
        &self,
        old: &dyn Snapshot,
        specific_paths: &[RepoPathBuf],
    ) -> EngineResult<Delta> {
        let old = old
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| EngineError::Other("foreign snapshot".into()))?;
        let matches = |path: &RepoPathBuf| specific_paths.iter().any(|base| path.starts_with(base));
        let old_by_id = old.by_id();
        let new_by_id = self.by_id();
        let mut delta = Delta::default();
        for (path, entry) in self.entries.iter().filter(|(path, _)| !path.is_root()) {
            let Some((old_path, old_entry)) = old_by_id.get(&entry.id) else {
                if matches(path) {
                    delta.added.push(delta_entry(path, entry, false));
                }
                continue;
            };
            let text_changed = old_entry.content != entry.content;
            let meta_changed = old_entry.kind != entry.kind;
            if *old_path != path {
                if matches(old_path) || matches(path) {
                    delta.renamed.push(RenamedEntry {
                        old_path: (*old_path).clone(),
                        new_path: path.clone(),
                        id: entry.id.clone(),
                        kind: entry.kind,
                        text_changed,
                        meta_changed,
                    });
                }
            } else if (text_changed || meta_changed) && matches(path) {
                delta.modified.push(delta_entry(path, entry, text_changed));
            }
        }
        for (path, entry) in old.entries.iter().filter(|(path, _)| !path.is_root()) {
            if !new_by_id.contains_key(&entry.id) && matches(path) {
                delta.removed.push(delta_entry(path, entry, false));
            }
        }
        Ok(delta)
    }

    fn lock_read(&self) -> EngineResult<()> {
        self.lock_log.lock();
        Ok(())
    }

    fn unlock(&self) {
        self.lock_log.unlock();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn delta_entry(path: &RepoPathBuf, entry: &TreeEntry, text_changed: bool) -> DeltaEntry {
    DeltaEntry {
        path: path.clone(),
        id: entry.id.clone(),
        kind: entry.kind,
        text_changed,
        meta_changed: false,
    }
}

#[derive(Debug)]
pub struct TestBranch {
    base: String,
    nick: String,
    local_root: Option<PathBuf>,
    revisions: Vec<Arc<TestSnapshot>>,
    lock_log: LockLog,
}

impl Branch for TestBranch {
    fn base(&self) -> &str {
        &self.base
    }

    fn nick(&self) -> &str {
        &self.nick
    }

    fn local_root(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }

    fn latest_snapshot(&self) -> EngineResult<Arc<dyn Snapshot>> {
        match self.revisions.last() {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Ok(Arc::new(TestSnapshot::new(
                format!("{}@empty", self.nick),
                &TreeBuilder::new(),
                self.lock_log.clone(),
            ))),
        }
    }

    /// Revisions are numbered from 1.
    fn historical_snapshot(&self, spec: &RevisionSpec) -> EngineResult<HistoricalSnapshot> {
        let no_such_revision = || EngineError::NoSuchRevision {
            spec: spec.to_string(),
            branch: self.nick.clone(),
        };
        let revno: usize = spec.as_str().parse().map_err(|_| no_such_revision())?;
        let snapshot = revno
            .checked_sub(1)
            .and_then(|index| self.revisions.get(index))
            .ok_or_else(no_such_revision)?;
        Ok(HistoricalSnapshot {
            revno: revno.to_string(),
            snapshot: snapshot.clone(),
        })
    }
}

#[derive(Debug)]
struct TestWorkingCopy {
    root: PathBuf,
    tree: Arc<TestSnapshot>,
}

/// An in-memory repository engine.
///
/// Local branches live in directories below a temporary directory. A branch
/// with a working copy has its files written to disk.
pub struct TestEngine {
    temp_dir: TempDir,
    branches: Vec<(Arc<TestBranch>, Option<TestWorkingCopy>)>,
    lock_log: LockLog,
}

impl Debug for TestEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEngine")
            .field("root", &self.temp_dir.path())
            .finish_non_exhaustive()
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            temp_dir: new_temp_dir(),
            branches: vec![],
            lock_log: LockLog::default(),
        }
    }

    /// Directory holding the local branches.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn lock_log(&self) -> &LockLog {
        &self.lock_log
    }

    /// Adds a local branch in directory `name`, returning its root. With
    /// `working_copy`, the branch has a live checkout of that content.
    pub fn add_branch(
        &mut self,
        name: &str,
        revisions: &[TreeBuilder],
        working_copy: Option<&TreeBuilder>,
    ) -> PathBuf {
        let root = self.temp_dir.path().join(name);
        fs::create_dir(&root).unwrap();
        let branch = self.new_branch(
            root.to_str().unwrap().to_owned(),
            name,
            Some(root.clone()),
            revisions,
        );
        let working_copy = working_copy.map(|tree| {
            let tree = Arc::new(TestSnapshot::new(
                format!("{name}@working-copy"),
                tree,
                self.lock_log.clone(),
            ));
            tree.write_to(&root).unwrap();
            TestWorkingCopy {
                root: root.clone(),
                tree,
            }
        });
        self.branches.push((branch, working_copy));
        root
    }

    /// Adds a branch only reachable through `url`.
    pub fn add_remote_branch(&mut self, url: &str, nick: &str, revisions: &[TreeBuilder]) {
        let branch = self.new_branch(url.to_owned(), nick, None, revisions);
        self.branches.push((branch, None));
    }

    fn new_branch(
        &self,
        base: String,
        nick: &str,
        local_root: Option<PathBuf>,
        revisions: &[TreeBuilder],
    ) -> Arc<TestBranch> {
        let revisions = revisions
            .iter()
            .enumerate()
            .map(|(index, tree)| {
                Arc::new(TestSnapshot::new(
                    format!("{nick}@{}", index + 1),
                    tree,
                    self.lock_log.clone(),
                ))
            })
            .collect();
        Arc::new(TestBranch {
            base,
            nick: nick.to_owned(),
            local_root,
            revisions,
            lock_log: self.lock_log.clone(),
        })
    }

    fn find_local(
        &self,
        location: &str,
    ) -> EngineResult<(&Arc<TestBranch>, Option<&TestWorkingCopy>, RepoPathBuf)> {
        let path = Path::new(location);
        self.branches
            .iter()
            .find_map(|(branch, working_copy)| {
                let root = branch.local_root.as_ref()?;
                let relative = path_within(root, path)?;
                Some((branch, working_copy.as_ref(), relative))
            })
            .map(|(branch, working_copy, relative)| {
                let path = RepoPathBuf::from_relative_path(relative)
                    .map_err(|err| EngineError::Other(err.into()))?;
                Ok((branch, working_copy, path))
            })
            .unwrap_or_else(|| {
                Err(EngineError::NotBranch {
                    location: location.to_owned(),
                })
            })
    }

    fn find_remote(&self, location: &str) -> EngineResult<(&Arc<TestBranch>, RepoPathBuf)> {
        self.branches
            .iter()
            .filter(|(branch, _)| branch.local_root.is_none())
            .find_map(|(branch, _)| {
                let rest = location.strip_prefix(branch.base.as_str())?;
                match rest.strip_prefix('/') {
                    Some(rest) => Some((branch, rest)),
                    None if rest.is_empty() => Some((branch, rest)),
                    None => None,
                }
            })
            .map(|(branch, rest)| {
                let path = RepoPathBuf::from_internal_string(rest)
                    .map_err(|err| EngineError::Other(err.into()))?;
                Ok((branch, path))
            })
            .unwrap_or_else(|| {
                Err(EngineError::NotBranch {
                    location: location.to_owned(),
                })
            })
    }
}

impl RepoEngine for TestEngine {
    fn open_working_copy_containing(&self, location: &str) -> EngineResult<WorkingCopyMatch> {
        if !self.is_local(location) {
            return Err(EngineError::NotLocal {
                location: location.to_owned(),
            });
        }
        let (branch, working_copy, path) = self.find_local(location)?;
        let working_copy = working_copy.ok_or_else(|| EngineError::NoWorkingCopy {
            location: location.to_owned(),
        })?;
        Ok(WorkingCopyMatch {
            branch: branch.clone(),
            tree: working_copy.tree.clone(),
            root: working_copy.root.clone(),
            path,
        })
    }

    fn open_branch_containing(&self, location: &str) -> EngineResult<BranchMatch> {
        let (branch, path) = if self.is_local(location) {
            let (branch, _, path) = self.find_local(location)?;
            (branch, path)
        } else {
            self.find_remote(location)?
        };
        Ok(BranchMatch {
            branch: branch.clone(),
            path,
        })
    }

    fn is_local(&self, location: &str) -> bool {
        !location.contains("://")
    }
}
