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

//! Scoped read locks on snapshots.

use std::sync::Arc;

use tracing::instrument;

use crate::engine::EngineResult;
use crate::engine::Snapshot;

/// Holds read locks on a set of snapshots. The locks are released in reverse
/// order when this is dropped.
#[must_use]
#[derive(Debug)]
pub struct ReadLocks {
    locked: Vec<Arc<dyn Snapshot>>,
}

impl ReadLocks {
    /// Locks every snapshot. If any lock fails, the ones already taken are
    /// released before the error is returned.
    #[instrument(skip_all)]
    pub fn acquire(
        snapshots: impl IntoIterator<Item = Arc<dyn Snapshot>>,
    ) -> EngineResult<Self> {
        let mut locks = Self { locked: vec![] };
        for snapshot in snapshots {
            snapshot.lock_read()?;
            tracing::debug!(?snapshot, "locked for reading");
            locks.locked.push(snapshot);
        }
        Ok(locks)
    }
}

impl Drop for ReadLocks {
    fn drop(&mut self) {
        while let Some(snapshot) = self.locked.pop() {
            snapshot.unlock();
            tracing::debug!(?snapshot, "unlocked");
        }
    }
}
