// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Normalized node records and their per-branch loading status.

use alloc::string::String;
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::NodeId;

bitflags::bitflags! {
    /// Boolean node state.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Disabled, either explicitly or inherited from an ancestor.
        const DISABLED = 0b0000_0001;
        /// The raw object asked for this node to start expanded.
        const DEFAULT_EXPANDED = 0b0000_0010;
        /// Expanded by the user or by the default expand level.
        const EXPANDED = 0b0000_0100;
        /// Synthesized stand-in for a selected id missing from the tree.
        const FALLBACK = 0b0000_1000;
        /// At least one descendant is disabled.
        const HAS_DISABLED_DESCENDANTS = 0b0001_0000;
    }
}

/// Lazy-loading status of a branch's children, or of a root or search scope.
///
/// Transitions:
///
/// ```text
/// Unloaded --begin--> Loading --succeed--> Loaded
///                        |
///                        +-----fail-----> Failed --begin--> Loading
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing fetched yet.
    #[default]
    Unloaded,
    /// A request is in flight.
    Loading,
    /// Content is present.
    Loaded,
    /// The last request failed with this message.
    Failed(String),
}

impl LoadState {
    /// Moves to [`LoadState::Loading`].
    ///
    /// Returns `false`, leaving the state alone, when a request is already in
    /// flight or the content is already loaded.
    pub fn begin(&mut self) -> bool {
        match self {
            Self::Unloaded | Self::Failed(_) => {
                *self = Self::Loading;
                true
            }
            Self::Loading | Self::Loaded => false,
        }
    }

    /// Marks the content as present.
    pub fn succeed(&mut self) {
        *self = Self::Loaded;
    }

    /// Records a failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        *self = Self::Failed(message.into());
    }

    /// Returns `true` while a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns `true` once content is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// The error of the last failed request.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Descendant counts of a branch node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BranchCount {
    /// Direct children.
    pub all_children: usize,
    /// All descendants.
    pub all_descendants: usize,
    /// Direct children that are leaves.
    pub leaf_children: usize,
    /// Descendants that are leaves.
    pub leaf_descendants: usize,
}

#[derive(Clone, Debug)]
pub(crate) enum Shape {
    Leaf,
    Branch {
        /// `None` until loaded.
        children: Option<Vec<NodeId>>,
        load: LoadState,
        count: BranchCount,
    },
}

/// Where a node's raw object lives.
#[derive(Clone, Debug)]
pub(crate) enum RawLocation {
    /// Child indices from the source roots down to the object.
    Source(SmallVec<[usize; 8]>),
    /// Owned by the forest's detached store (fallback nodes).
    Detached,
}

/// A normalized option node.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) label: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) ancestors: SmallVec<[NodeId; 4]>,
    pub(crate) shape: Shape,
    pub(crate) level: usize,
    pub(crate) index_path: SmallVec<[usize; 8]>,
    pub(crate) raw: RawLocation,
    pub(crate) flags: NodeFlags,
    pub(crate) lower_cased: SmallVec<[String; 1]>,
    pub(crate) nested_search_label: String,
}

impl Node {
    /// Identity of the node.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Display text. Synthesized for fallback nodes.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Parent id. `None` for roots and fallback nodes.
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Ancestors ordered from nearest to furthest.
    #[must_use]
    pub fn ancestors(&self) -> &[NodeId] {
        &self.ancestors
    }

    /// Returns `true` for roots and fallback nodes.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns `true` when the node can have children, loaded or not.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self.shape, Shape::Branch { .. })
    }

    /// Returns `true` when the node cannot have children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.is_branch()
    }

    /// Child ids in display order.
    ///
    /// `None` for leaves and for branches whose children are not loaded yet.
    #[must_use]
    pub fn child_ids(&self) -> Option<&[NodeId]> {
        match &self.shape {
            Shape::Branch {
                children: Some(children),
                ..
            } => Some(children),
            _ => None,
        }
    }

    /// Child ids, or an empty slice when there are none to visit.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        self.child_ids().unwrap_or(&[])
    }

    /// Loading status of a branch. `None` for leaves.
    #[must_use]
    pub fn load_state(&self) -> Option<&LoadState> {
        match &self.shape {
            Shape::Branch { load, .. } => Some(load),
            Shape::Leaf => None,
        }
    }

    /// Returns `true` for a branch whose children are present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.child_ids().is_some()
    }

    /// Descendant counts. `None` for leaves.
    #[must_use]
    pub fn count(&self) -> Option<BranchCount> {
        match &self.shape {
            Shape::Branch { count, .. } => Some(*count),
            Shape::Leaf => None,
        }
    }

    /// Depth in the tree; roots are at level 0.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Sibling positions from the root down to this node, in display order.
    ///
    /// Fallback nodes have an empty path and therefore sort before every
    /// node of the tree.
    #[must_use]
    pub fn index_path(&self) -> &[usize] {
        &self.index_path
    }

    /// State flags.
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Returns `true` when disabled explicitly or through an ancestor.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.flags.contains(NodeFlags::DISABLED)
    }

    /// Returns `true` when expanded outside of search.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.flags.contains(NodeFlags::EXPANDED)
    }

    /// Returns `true` for synthesized stand-ins of unknown selected ids.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.flags.contains(NodeFlags::FALLBACK)
    }

    /// Returns `true` when at least one descendant is disabled.
    #[must_use]
    pub fn has_disabled_descendants(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_DISABLED_DESCENDANTS)
    }

    /// Lower-cased searchable texts, one per configured match key.
    #[must_use]
    pub fn lower_cased(&self) -> &[String] {
        &self.lower_cased
    }

    /// Lower-cased labels of all ancestors and the node itself, root first,
    /// separated by spaces.
    #[must_use]
    pub fn nested_search_label(&self) -> &str {
        &self.nested_search_label
    }
}
