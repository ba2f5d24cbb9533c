// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ordered set of selected node ids.

use alloc::vec::Vec;

use hashbrown::HashSet;
use understory_forest::NodeId;

/// Selected node ids in selection order, with no duplicates.
///
/// This is the source of truth for selection; checked states and the
/// external value are derived from it. Membership checks go through a hash
/// index, so every operation is linear at worst.
///
/// A revision counter bumps only when the contents actually change.
#[derive(Clone, Debug, Default)]
pub struct SelectedIds {
    items: Vec<NodeId>,
    index: HashSet<NodeId>,
    revision: u64,
}

impl SelectedIds {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of selected ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Selected ids in selection order.
    #[must_use]
    pub fn items(&self) -> &[NodeId] {
        &self.items
    }

    /// Iterates the selected ids in selection order.
    pub fn iter(&self) -> core::slice::Iter<'_, NodeId> {
        self.items.iter()
    }

    /// Returns `true` if `id` is selected.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains(id)
    }

    /// The most recently added id.
    #[must_use]
    pub fn last(&self) -> Option<&NodeId> {
        self.items.last()
    }

    /// The revision counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Appends `id` unless it is already selected. Returns `true` if added.
    pub fn insert(&mut self, id: NodeId) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.items.push(id);
        self.bump_revision();
        true
    }

    /// Removes `id`. Returns `true` if it was selected.
    pub fn remove(&mut self, id: &NodeId) -> bool {
        if !self.index.remove(id) {
            return false;
        }
        self.items.retain(|item| item != id);
        self.bump_revision();
        true
    }

    /// Keeps only the ids for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        let before = self.items.len();
        let index = &mut self.index;
        self.items.retain(|id| {
            let kept = keep(id);
            if !kept {
                index.remove(id);
            }
            kept
        });
        if self.items.len() != before {
            self.bump_revision();
        }
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.index.clear();
        self.bump_revision();
    }

    /// Replaces the contents, dropping duplicates in the input.
    ///
    /// The revision is left alone when the result equals the current
    /// contents, order included.
    pub fn replace_with<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut index = HashSet::new();
        let mut items = Vec::new();
        for id in ids {
            if index.insert(id.clone()) {
                items.push(id);
            }
        }
        if items == self.items {
            return;
        }
        self.items = items;
        self.index = index;
        self.bump_revision();
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
