// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The node registry: an arena of normalized nodes keyed by id.

use alloc::borrow::Cow;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::diagnostic::report;
use crate::node::{RawLocation, Shape};
use crate::{
    BranchCount, Children, ForestDiagnostic, LoadState, Node, NodeFields, NodeFlags, NodeId,
    Normalizer,
};

/// Options that shape how raw options become nodes.
///
/// Changing any of these requires a [`Forest::reshape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Disabled state does not inherit to descendants.
    pub flat: bool,
    /// Within each sibling group, branches are placed before leaves.
    pub branch_nodes_first: bool,
    /// Branches shallower than this level start expanded.
    pub default_expand_level: usize,
    /// Node fields indexed for search, e.g. `label` or `id`.
    pub match_keys: Vec<String>,
    /// A children loader is available.
    pub can_load_children: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            flat: false,
            branch_nodes_first: false,
            default_expand_level: 0,
            match_keys: vec!["label".into()],
            can_load_children: false,
        }
    }
}

/// What a build found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct BuildReport {
    /// Problems with the option data.
    pub diagnostics: Vec<ForestDiagnostic>,
    /// Unloaded branches that are expanded and whose children should be fetched.
    pub load_children: Vec<NodeId>,
}

/// The node registry.
///
/// A `Forest` owns the raw option tree it was built from and an arena that
/// maps every known id to its normalized [`Node`]. Nodes refer to each other
/// by id only.
///
/// ```
/// use serde_json::json;
/// use understory_forest::{BuildOptions, Forest, JsonNormalizer, NodeId};
///
/// let mut forest = Forest::new(JsonNormalizer::new(), BuildOptions::default());
/// let report = forest.rebuild(
///     vec![json!({ "id": "a", "children": [{ "id": "aa" }, { "id": "ab" }] })],
///     &[],
/// );
/// assert!(report.diagnostics.is_empty());
///
/// let ab = forest.node(&NodeId::from("ab")).unwrap();
/// assert_eq!(ab.level(), 1);
/// assert_eq!(ab.index_path(), &[0, 1]);
/// assert_eq!(forest.node(&"a".into()).unwrap().count().unwrap().all_children, 2);
/// ```
pub struct Forest<N: Normalizer> {
    normalizer: N,
    options: BuildOptions,
    source: Vec<N::Raw>,
    detached: HashMap<NodeId, N::Raw>,
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    revision: u64,
}

impl<N: Normalizer> fmt::Debug for Forest<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("options", &self.options)
            .field("roots", &self.roots)
            .field("nodes", &self.nodes.len())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl<N: Normalizer> Forest<N> {
    /// Creates an empty forest.
    pub fn new(normalizer: N, options: BuildOptions) -> Self {
        Self {
            normalizer,
            options,
            source: Vec::new(),
            detached: HashMap::new(),
            nodes: HashMap::new(),
            roots: Vec::new(),
            revision: 0,
        }
    }

    /// The normalizer in use.
    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    /// The options used by the last build.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Replaces the build options. Takes effect on the next build.
    pub fn set_options(&mut self, options: BuildOptions) {
        self.options = options;
    }

    /// The raw root options, with any loaded children written back into them.
    pub fn source(&self) -> &[N::Raw] {
        &self.source
    }

    /// Revision counter, bumped whenever nodes or their state change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of nodes, fallback nodes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` is known, possibly as a fallback node.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up a node.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterates all nodes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Ids of the root nodes in display order. Fallback nodes are not roots
    /// of the displayed tree and are not listed.
    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    /// The raw object a node was normalized from.
    pub fn raw(&self, id: &NodeId) -> Option<&N::Raw> {
        match &self.nodes.get(id)?.raw {
            RawLocation::Detached => self.detached.get(id),
            RawLocation::Source(path) => locate(&self.normalizer, &self.source, path),
        }
    }

    /// Descendants of `id` in breadth-first order, excluding `id` itself.
    pub fn descendants(&self, id: &NodeId) -> Descendants<'_> {
        let mut queue = VecDeque::new();
        if let Some(node) = self.nodes.get(id) {
            queue.extend(node.children());
        }
        Descendants {
            nodes: &self.nodes,
            queue,
        }
    }

    /// All tree nodes in pre-order (document order). Fallback nodes are not
    /// visited.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            nodes: &self.nodes,
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Rebuilds the registry from a new raw root list.
    ///
    /// Expansion and loading state carry over by id from the previous build.
    /// Every id in `keep` that was known before but is absent from the new
    /// tree becomes a fallback node with its previous label and raw object.
    pub fn rebuild(&mut self, source: Vec<N::Raw>, keep: &[NodeId]) -> BuildReport {
        let kept: Vec<(NodeId, String, N::Raw)> = keep
            .iter()
            .filter_map(|id| {
                let label = self.nodes.get(id)?.label.clone();
                let raw = self.raw(id)?.clone();
                Some((id.clone(), label, raw))
            })
            .collect();

        let previous = mem::take(&mut self.nodes);
        self.detached.clear();
        self.source = source;

        let mut report = BuildReport::default();
        let mut grow = Grow {
            normalizer: &self.normalizer,
            options: &self.options,
            previous: Some(&previous),
            nodes: &mut self.nodes,
            detached: &mut self.detached,
            report: &mut report,
            created: Vec::new(),
        };
        let roots = grow.run(None, &self.source, &[]);
        let created = grow.created;
        self.roots = roots;
        self.recount(created.iter().rev());

        for (id, label, raw) in kept {
            if !self.nodes.contains_key(&id) {
                self.insert_detached(id, label, raw);
            }
        }

        self.bump();
        tracing::debug!(
            nodes = self.nodes.len(),
            roots = self.roots.len(),
            "rebuilt option forest"
        );
        report
    }

    /// Rebuilds from the current raw roots, e.g. after [`set_options`](Self::set_options).
    pub fn reshape(&mut self, keep: &[NodeId]) -> BuildReport {
        let source = mem::take(&mut self.source);
        self.rebuild(source, keep)
    }

    /// Writes a loaded children list into the branch `parent` and normalizes
    /// just that subtree.
    ///
    /// Fallback nodes whose ids appear among the new nodes are replaced. Returns
    /// `None` if `parent` is not a branch of the current tree.
    pub fn merge_children(
        &mut self,
        parent: &NodeId,
        children: Vec<N::Raw>,
    ) -> Option<BuildReport> {
        let node = self.nodes.get(parent)?;
        if !node.is_branch() {
            return None;
        }
        let RawLocation::Source(path) = node.raw.clone() else {
            return None;
        };

        let stale: Vec<NodeId> = self.descendants(parent).map(|n| n.id.clone()).collect();
        for id in &stale {
            self.nodes.remove(id);
        }

        let normalizer = &self.normalizer;
        let raw = locate_mut(normalizer, &mut self.source, &path)?;
        normalizer.set_children(raw, Some(children));

        let raw = locate(normalizer, &self.source, &path)?;
        let Children::Loaded(items) = normalizer.children(raw) else {
            return None;
        };
        let mut report = BuildReport::default();
        let mut grow = Grow {
            normalizer,
            options: &self.options,
            previous: None,
            nodes: &mut self.nodes,
            detached: &mut self.detached,
            report: &mut report,
            created: Vec::new(),
        };
        grow.run(Some(parent), items, &path);
        let created = grow.created;

        let mut lineage: Vec<NodeId> = vec![parent.clone()];
        if let Some(node) = self.nodes.get_mut(parent) {
            if let Shape::Branch { load, .. } = &mut node.shape {
                load.succeed();
            }
            lineage.extend(node.ancestors.iter().cloned());
        }
        self.recount(created.iter().rev().chain(lineage.iter()));
        self.bump();
        tracing::debug!(%parent, added = created.len(), "merged loaded children");
        Some(report)
    }

    /// Adds a fallback node for `id` unless the id is already known.
    ///
    /// The label is taken from `raw` when given and valid, otherwise it reads
    /// `"<id> (unknown)"`. Without `raw` the normalizer synthesizes one.
    /// Returns `true` if a node was added.
    pub fn insert_fallback(&mut self, id: NodeId, raw: Option<N::Raw>) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        let label = raw
            .as_ref()
            .and_then(|raw| self.normalizer.normalize(raw).ok())
            .map(|fields| fields.label.into_owned())
            .unwrap_or_else(|| format!("{id} (unknown)"));
        let raw = raw.unwrap_or_else(|| self.normalizer.synthesize(&id));
        self.insert_detached(id, label, raw);
        self.bump();
        true
    }

    /// Sets the expansion of a branch. Returns `true` if it changed.
    pub fn set_expanded(&mut self, id: &NodeId, expanded: bool) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !node.is_branch() || node.is_expanded() == expanded {
            return false;
        }
        node.flags.set(NodeFlags::EXPANDED, expanded);
        self.bump();
        true
    }

    /// Marks the children of branch `id` as being fetched.
    ///
    /// Returns `false` when the branch is unknown, already loaded, or a
    /// request is already in flight.
    pub fn begin_load(&mut self, id: &NodeId) -> bool {
        let began = match self.nodes.get_mut(id).map(|n| &mut n.shape) {
            Some(Shape::Branch {
                children: None,
                load,
                ..
            }) => load.begin(),
            _ => false,
        };
        if began {
            self.bump();
        }
        began
    }

    /// Records a failed children fetch for branch `id`.
    pub fn fail_load(&mut self, id: &NodeId, message: impl Into<String>) {
        if let Some(Shape::Branch {
            children: None,
            load,
            ..
        }) = self.nodes.get_mut(id).map(|n| &mut n.shape)
        {
            load.fail(message);
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn insert_detached(&mut self, id: NodeId, label: String, raw: N::Raw) {
        let lower_label = label.to_lowercase();
        let lower_cased = match_texts(&self.normalizer, &self.options, &id, &lower_label, &raw);
        let node = Node {
            id: id.clone(),
            label,
            parent: None,
            ancestors: SmallVec::new(),
            shape: Shape::Leaf,
            level: 0,
            index_path: SmallVec::new(),
            raw: RawLocation::Detached,
            flags: NodeFlags::FALLBACK,
            lower_cased,
            nested_search_label: lower_label,
        };
        self.detached.insert(id.clone(), raw);
        self.nodes.insert(id, node);
    }

    /// Recomputes branch counts and disabled-descendant flags. Children must
    /// be visited before their parents.
    fn recount<'i>(&mut self, ids: impl Iterator<Item = &'i NodeId>) {
        for id in ids {
            let Some(Shape::Branch { children, .. }) = self.nodes.get(id).map(|n| &n.shape) else {
                continue;
            };
            let mut count = BranchCount::default();
            let mut disabled_below = false;
            for child in children.iter().flatten() {
                let Some(child) = self.nodes.get(child) else {
                    continue;
                };
                count.all_children += 1;
                count.all_descendants += 1;
                if let Some(sub) = child.count() {
                    count.all_descendants += sub.all_descendants;
                    count.leaf_descendants += sub.leaf_descendants;
                } else {
                    count.leaf_children += 1;
                    count.leaf_descendants += 1;
                }
                disabled_below |= child.is_disabled() || child.has_disabled_descendants();
            }
            if let Some(node) = self.nodes.get_mut(id) {
                if let Shape::Branch { count: slot, .. } = &mut node.shape {
                    *slot = count;
                }
                node.flags
                    .set(NodeFlags::HAS_DISABLED_DESCENDANTS, disabled_below);
            }
        }
    }
}

/// Lower-cased text of each configured match key.
fn match_texts<N: Normalizer>(
    normalizer: &N,
    options: &BuildOptions,
    id: &NodeId,
    lower_label: &str,
    raw: &N::Raw,
) -> SmallVec<[String; 1]> {
    options
        .match_keys
        .iter()
        .map(|key| match key.as_str() {
            "label" => lower_label.to_string(),
            "id" => id.to_text().to_lowercase(),
            other => normalizer
                .match_field(raw, other)
                .map(|text: Cow<'_, str>| text.to_lowercase())
                .unwrap_or_default(),
        })
        .collect()
}

fn locate<'s, N: Normalizer>(
    normalizer: &N,
    source: &'s [N::Raw],
    path: &[usize],
) -> Option<&'s N::Raw> {
    let (first, rest) = path.split_first()?;
    let mut raw = source.get(*first)?;
    for &index in rest {
        match normalizer.children(raw) {
            Children::Loaded(items) => raw = items.get(index)?,
            Children::Absent | Children::Unloaded => return None,
        }
    }
    Some(raw)
}

fn locate_mut<'s, N: Normalizer>(
    normalizer: &N,
    source: &'s mut [N::Raw],
    path: &[usize],
) -> Option<&'s mut N::Raw> {
    let (first, rest) = path.split_first()?;
    let mut raw = source.get_mut(*first)?;
    for &index in rest {
        raw = normalizer.children_mut(raw)?.get_mut(index)?;
    }
    Some(raw)
}

struct Entry<'s, R> {
    raw_index: usize,
    raw: &'s R,
    fields: NodeFields<'s>,
    children: Children<'s, R>,
}

/// One sibling group being walked.
struct Frame<'s, R> {
    parent: Option<NodeId>,
    raw_prefix: SmallVec<[usize; 8]>,
    entries: vec::IntoIter<Entry<'s, R>>,
    accepted: Vec<NodeId>,
}

/// Iterative pre-order builder shared by full rebuilds and subtree merges.
struct Grow<'a, N: Normalizer> {
    normalizer: &'a N,
    options: &'a BuildOptions,
    previous: Option<&'a HashMap<NodeId, Node>>,
    nodes: &'a mut HashMap<NodeId, Node>,
    detached: &'a mut HashMap<NodeId, N::Raw>,
    report: &'a mut BuildReport,
    /// Ids in creation order; parents precede their children.
    created: Vec<NodeId>,
}

impl<'a, N: Normalizer> Grow<'a, N> {
    /// Walks `siblings` under `parent` and returns the accepted top-level ids.
    fn run<'s>(
        &mut self,
        parent: Option<&NodeId>,
        siblings: &'s [N::Raw],
        raw_prefix: &[usize],
    ) -> Vec<NodeId> {
        let mut stack = vec![self.frame(parent.cloned(), siblings, raw_prefix.into())];
        loop {
            let Some(frame) = stack.last_mut() else {
                return Vec::new();
            };
            let Some(entry) = frame.entries.next() else {
                let Some(done) = stack.pop() else {
                    return Vec::new();
                };
                if let Some(Shape::Branch { children, .. }) = done
                    .parent
                    .as_ref()
                    .and_then(|p| self.nodes.get_mut(p))
                    .map(|n| &mut n.shape)
                {
                    *children = Some(done.accepted.clone());
                }
                if stack.is_empty() {
                    return done.accepted;
                }
                continue;
            };
            let parent_id = frame.parent.clone();
            let index = frame.accepted.len();
            let mut raw_path = frame.raw_prefix.clone();
            raw_path.push(entry.raw_index);
            if let Some((id, items)) = self.create(parent_id.as_ref(), index, raw_path.clone(), entry)
            {
                if let Some(frame) = stack.last_mut() {
                    frame.accepted.push(id.clone());
                }
                if let Some(items) = items {
                    stack.push(self.frame(Some(id), items, raw_path));
                }
            }
        }
    }

    fn frame<'s>(
        &mut self,
        parent: Option<NodeId>,
        siblings: &'s [N::Raw],
        raw_prefix: SmallVec<[usize; 8]>,
    ) -> Frame<'s, N::Raw> {
        let mut entries = Vec::with_capacity(siblings.len());
        for (raw_index, raw) in siblings.iter().enumerate() {
            match self.normalizer.normalize(raw) {
                Ok(fields) => entries.push(Entry {
                    raw_index,
                    raw,
                    fields,
                    children: self.normalizer.children(raw),
                }),
                Err(err) => report(&mut self.report.diagnostics, err.into()),
            }
        }
        if self.options.branch_nodes_first {
            entries.sort_by_key(|entry| !entry.children.is_branch());
        }
        Frame {
            parent,
            raw_prefix,
            entries: entries.into_iter(),
            accepted: Vec::new(),
        }
    }

    /// Creates one node. Returns its id and, for loaded branches, the raw
    /// children still to walk.
    fn create<'s>(
        &mut self,
        parent_id: Option<&NodeId>,
        index: usize,
        raw_path: SmallVec<[usize; 8]>,
        entry: Entry<'s, N::Raw>,
    ) -> Option<(NodeId, Option<&'s [N::Raw]>)> {
        let Entry {
            raw,
            fields,
            children,
            ..
        } = entry;
        let id = fields.id.clone();

        if let Some(existing) = self.nodes.get(&id) {
            if !existing.is_fallback() {
                report(
                    &mut self.report.diagnostics,
                    ForestDiagnostic::DuplicateId {
                        id,
                        first_label: existing.label.clone(),
                        duplicate_label: fields.label.into_owned(),
                    },
                );
                return None;
            }
            self.detached.remove(&id);
        }

        let parent = parent_id.and_then(|p| self.nodes.get(p));
        let level = parent.map_or(0, |p| p.level + 1);
        let mut ancestors = SmallVec::new();
        let mut index_path = SmallVec::new();
        if let (Some(parent_id), Some(parent)) = (parent_id, parent) {
            ancestors.push(parent_id.clone());
            ancestors.extend(parent.ancestors.iter().cloned());
            index_path.extend_from_slice(&parent.index_path);
        }
        index_path.push(index);

        let lower_label = fields.label.to_lowercase();
        let nested_search_label = match parent {
            Some(parent) => format!("{} {}", parent.nested_search_label, lower_label),
            None => lower_label.clone(),
        };
        let lower_cased = match_texts(self.normalizer, self.options, &id, &lower_label, raw);

        let mut flags = NodeFlags::empty();
        let inherited = !self.options.flat && parent.is_some_and(Node::is_disabled);
        flags.set(NodeFlags::DISABLED, fields.is_disabled || inherited);
        flags.set(
            NodeFlags::DEFAULT_EXPANDED,
            fields.is_default_expanded == Some(true),
        );

        let (mut shape, walk) = match children {
            Children::Absent => {
                if fields.declares_branch {
                    report(
                        &mut self.report.diagnostics,
                        ForestDiagnostic::BranchMarkerWithoutChildren { id: id.clone() },
                    );
                }
                (Shape::Leaf, None)
            }
            Children::Unloaded => (
                Shape::Branch {
                    children: None,
                    load: LoadState::Unloaded,
                    count: BranchCount::default(),
                },
                None,
            ),
            Children::Loaded(items) => (
                Shape::Branch {
                    children: Some(Vec::new()),
                    load: LoadState::Loaded,
                    count: BranchCount::default(),
                },
                Some(items),
            ),
        };

        let mut expanded = false;
        if let Shape::Branch {
            children: child_ids,
            load,
            ..
        } = &mut shape
        {
            expanded = fields
                .is_default_expanded
                .unwrap_or(level < self.options.default_expand_level);
            let previous = self
                .previous
                .and_then(|p| p.get(&id))
                .filter(|p| p.is_branch());
            if let Some(previous) = previous {
                expanded = previous.is_expanded();
                if child_ids.is_none() {
                    match previous.load_state() {
                        // Children were taken away: back to unloaded, collapsed.
                        Some(LoadState::Loaded) => expanded = false,
                        Some(state) => *load = state.clone(),
                        None => {}
                    }
                }
            }
            if child_ids.is_none() {
                if !self.options.can_load_children {
                    report(
                        &mut self.report.diagnostics,
                        ForestDiagnostic::UnloadedBranchWithoutLoader { id: id.clone() },
                    );
                } else if expanded && *load == LoadState::Unloaded {
                    self.report.load_children.push(id.clone());
                }
            }
        }
        flags.set(NodeFlags::EXPANDED, expanded);

        if fields.is_default_expanded == Some(true) {
            for ancestor in &ancestors {
                if let Some(node) = self.nodes.get_mut(ancestor) {
                    node.flags.insert(NodeFlags::EXPANDED);
                }
            }
        }

        let node = Node {
            id: id.clone(),
            label: fields.label.into_owned(),
            parent: parent_id.cloned(),
            ancestors,
            shape,
            level,
            index_path,
            raw: RawLocation::Source(raw_path),
            flags,
            lower_cased,
            nested_search_label,
        };
        self.nodes.insert(id.clone(), node);
        self.created.push(id.clone());
        Some((id, walk))
    }
}

/// Breadth-first iterator over the descendants of a node.
#[derive(Debug)]
pub struct Descendants<'a> {
    nodes: &'a HashMap<NodeId, Node>,
    queue: VecDeque<&'a NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.queue.pop_front() {
            if let Some(node) = self.nodes.get(id) {
                self.queue.extend(node.children());
                return Some(node);
            }
        }
        None
    }
}

/// Pre-order iterator over the displayed tree.
#[derive(Debug)]
pub struct PreOrder<'a> {
    nodes: &'a HashMap<NodeId, Node>,
    stack: Vec<&'a NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                self.stack.extend(node.children().iter().rev());
                return Some(node);
            }
        }
        None
    }
}
