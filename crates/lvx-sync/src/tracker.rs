// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural key → render handle side table.

use std::collections::HashMap;

use lvx_graph::EntityKey;
use lvx_scene_port::RenderHandle;

use crate::IdentityError;

/// Maps the structural key of each rendered entity to its live handle.
///
/// # Invariants
///
/// - At most one handle per key.
/// - `track` on an occupied key keeps the newer handle and reports the
///   displaced one; it is never silently overwritten.
/// - `untrack` on a missing key is a no-op.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    handles: HashMap<EntityKey, RenderHandle>,
}

impl IdentityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `key` with `handle`.
    pub fn track(&mut self, key: EntityKey, handle: RenderHandle) -> Result<(), IdentityError> {
        match self.handles.insert(key, handle) {
            Some(previous) if previous != handle => Err(IdentityError::AlreadyTracked {
                key,
                previous,
                current: handle,
            }),
            _ => Ok(()),
        }
    }

    /// Live handle for `key`.
    pub fn lookup(&self, key: &EntityKey) -> Option<RenderHandle> {
        self.handles.get(key).copied()
    }

    /// Forget `key`, returning its handle.
    pub fn untrack(&mut self, key: &EntityKey) -> Option<RenderHandle> {
        self.handles.remove(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove every entry, returning the handles in ascending order.
    pub fn drain(&mut self) -> Vec<RenderHandle> {
        let mut handles: Vec<_> = self.handles.drain().map(|(_, handle)| handle).collect();
        handles.sort_unstable();
        handles
    }
}
