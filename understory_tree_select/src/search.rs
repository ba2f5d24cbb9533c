// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Local search: per-node match state layered over the registry.
//!
//! A [`SearchOverlay`] is computed from a query against every tree node and
//! never mutates the [`Forest`]. Expansion while searching is tracked by the
//! overlay, separately from the nodes' regular expansion, so leaving search
//! restores the tree exactly as it was.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use understory_forest::{BranchCount, Forest, Node, NodeId, Normalizer};

use crate::TreeSelectConfig;

/// How queries are matched against nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Substring matching instead of subsequence matching.
    pub disable_fuzzy_matching: bool,
    /// Multi-word queries match each word against the nested search label.
    pub search_nested: bool,
    /// Results are listed flat, without their unmatched ancestors.
    pub flatten_search_results: bool,
}

impl SearchOptions {
    /// The search options of a configuration.
    #[must_use]
    pub fn from_config(config: &TreeSelectConfig) -> Self {
        Self {
            disable_fuzzy_matching: config.disable_fuzzy_matching,
            search_nested: config.search_nested,
            flatten_search_results: config.flatten_search_results,
        }
    }
}

/// Returns `true` if the characters of `needle` occur in `haystack` in order.
///
/// ```
/// use understory_tree_select::fuzzy_match;
///
/// assert!(fuzzy_match("apl", "apple"));
/// assert!(!fuzzy_match("lpa", "apple"));
/// assert!(fuzzy_match("", "anything"));
/// ```
#[must_use]
pub fn fuzzy_match(needle: &str, haystack: &str) -> bool {
    let mut rest = haystack.chars();
    needle.chars().all(|wanted| rest.any(|c| c == wanted))
}

/// Match state of an active local search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchOverlay {
    query: String,
    matched: HashSet<NodeId>,
    expanded: HashSet<NodeId>,
    matched_descendants: HashSet<NodeId>,
    show_all_children: HashSet<NodeId>,
    counts: HashMap<NodeId, BranchCount>,
}

impl SearchOverlay {
    /// Matches `query` against every tree node.
    ///
    /// Returns `None` for an empty query, which means search is inactive. The
    /// query is trimmed and lower-cased before matching.
    pub fn compute<N: Normalizer>(
        forest: &Forest<N>,
        query: &str,
        options: SearchOptions,
    ) -> Option<Self> {
        if query.is_empty() {
            return None;
        }
        let needle = query.trim().to_lowercase();
        let words: Vec<&str> = needle.split_whitespace().collect();
        let nested = options.search_nested && words.len() > 1;
        let is_match = |node: &Node| {
            if nested {
                words
                    .iter()
                    .all(|word| node.nested_search_label().contains(word))
            } else {
                node.lower_cased().iter().any(|text| {
                    if options.disable_fuzzy_matching {
                        text.contains(needle.as_str())
                    } else {
                        fuzzy_match(&needle, text)
                    }
                })
            }
        };

        let mut overlay = Self {
            query: query.into(),
            ..Self::default()
        };
        let order: Vec<&Node> = forest.pre_order().collect();
        for node in &order {
            if node.is_branch() {
                overlay.counts.insert(node.id().clone(), BranchCount::default());
            }
        }
        // Children before parents.
        for node in order.into_iter().rev() {
            let matched = is_match(node);
            if matched {
                overlay.matched.insert(node.id().clone());
                for ancestor in node.ancestors() {
                    if let Some(count) = overlay.counts.get_mut(ancestor) {
                        count.all_descendants += 1;
                        if node.is_leaf() {
                            count.leaf_descendants += 1;
                        }
                    }
                }
                if let Some(count) = node.parent().and_then(|p| overlay.counts.get_mut(p)) {
                    count.all_children += 1;
                    if node.is_leaf() {
                        count.leaf_children += 1;
                    }
                }
            }
            let reveals_parent =
                matched || (node.is_branch() && overlay.expanded.contains(node.id()));
            if let Some(parent) = node.parent().filter(|_| reveals_parent) {
                overlay.expanded.insert(parent.clone());
                overlay.matched_descendants.insert(parent.clone());
            }
        }
        tracing::trace!(
            query = overlay.query.as_str(),
            matched = overlay.matched.len(),
            "computed local search"
        );
        Some(overlay)
    }

    /// Carries branches the user expanded while searching over from a
    /// previous overlay, for ids that still exist.
    pub(crate) fn inherit_expansion<N: Normalizer>(&mut self, previous: &Self, forest: &Forest<N>) {
        for id in previous.show_all_children.iter().filter(|id| forest.contains(id)) {
            self.show_all_children.insert(id.clone());
            if previous.expanded.contains(id) {
                self.expanded.insert(id.clone());
            }
        }
    }

    /// The raw query as entered.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns `true` when nothing matched.
    #[must_use]
    pub fn no_results(&self) -> bool {
        self.matched.is_empty()
    }

    /// Returns `true` if `id` matched the query itself.
    #[must_use]
    pub fn is_matched(&self, id: &NodeId) -> bool {
        self.matched.contains(id)
    }

    /// Returns `true` if `id` is expanded while searching.
    #[must_use]
    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }

    /// Returns `true` if some descendant of `id` matched.
    #[must_use]
    pub fn has_matched_descendants(&self, id: &NodeId) -> bool {
        self.matched_descendants.contains(id)
    }

    /// Returns `true` if every child of `id` is shown, matched or not.
    #[must_use]
    pub fn shows_all_children(&self, id: &NodeId) -> bool {
        self.show_all_children.contains(id)
    }

    /// Counts of matched children and descendants of branch `id`.
    #[must_use]
    pub fn count(&self, id: &NodeId) -> Option<BranchCount> {
        self.counts.get(id).copied()
    }

    /// Flips the search expansion of `id`. Expanding also reveals all of its
    /// children. Returns the new state.
    pub fn toggle_expanded(&mut self, id: &NodeId) -> bool {
        if self.expanded.remove(id) {
            return false;
        }
        self.expanded.insert(id.clone());
        self.show_all_children.insert(id.clone());
        true
    }

    fn includes(&self, node: &Node, flatten: bool) -> bool {
        self.is_matched(node.id())
            || (node.is_branch() && self.has_matched_descendants(node.id()) && !flatten)
            || node.parent().is_some_and(|p| self.shows_all_children(p))
    }
}

/// One row of the rendered menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleRow {
    /// Node shown in the row.
    pub id: NodeId,
    /// Indentation level.
    pub level: usize,
}

/// Lists the rows to render, in display order.
///
/// Without a search overlay, this is every node reachable through expanded
/// branches. While searching, only nodes included by the search are listed,
/// and flattened results are all placed at level 0.
pub fn visible_rows<N: Normalizer>(
    forest: &Forest<N>,
    search: Option<&SearchOverlay>,
    flatten: bool,
) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    let mut stack: Vec<&NodeId> = forest.root_ids().iter().rev().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = forest.node(id) else {
            continue;
        };
        let (shown, expanded) = match search {
            None => (true, node.is_expanded()),
            Some(overlay) => (overlay.includes(node, flatten), overlay.is_expanded(id)),
        };
        if shown {
            let level = if search.is_some() && flatten {
                0
            } else {
                node.level()
            };
            rows.push(VisibleRow {
                id: id.clone(),
                level,
            });
        }
        if expanded {
            stack.extend(node.children().iter().rev());
        }
    }
    rows
}
