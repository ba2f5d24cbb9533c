// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checked states and selection propagation.
//!
//! Selection is stored as a [`SelectedIds`] list; the functions here apply a
//! user action to that list according to the configured mode, and derive the
//! per-node [`CheckedState`] from it.
//!
//! In multi-select, non-flat mode a branch is selected only when its whole
//! enabled subtree is, so a branch is [`CheckedState::Checked`] iff every
//! enabled descendant is checked and [`CheckedState::Indeterminate`] when
//! only some are. Disabled descendants keep their state unless
//! `allow_selecting_disabled_descendants` is set.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use hashbrown::HashMap;
use understory_forest::{Forest, Node, NodeId, Normalizer};

use crate::{SelectedIds, TreeSelectConfig};

/// Tri-state checkbox value of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CheckedState {
    /// Not selected, and no selected descendants.
    #[default]
    Unchecked = 0,
    /// Some but not all descendants are selected.
    Indeterminate = 1,
    /// Selected.
    Checked = 2,
}

/// Checked state of every known node, derived from the selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckedStates {
    states: HashMap<NodeId, CheckedState>,
}

impl CheckedStates {
    /// Derives the states from the selection.
    ///
    /// Every node starts unchecked and selected nodes are checked. When
    /// selection propagates, unselected ancestors of selected nodes are
    /// indeterminate.
    pub fn build<N: Normalizer>(
        forest: &Forest<N>,
        selected: &SelectedIds,
        config: &TreeSelectConfig,
    ) -> Self {
        let mut states: HashMap<NodeId, CheckedState> = forest
            .iter()
            .map(|node| (node.id().clone(), CheckedState::Unchecked))
            .collect();
        for id in selected.iter() {
            states.insert(id.clone(), CheckedState::Checked);
        }
        if config.propagates() {
            for node in selected.iter().filter_map(|id| forest.node(id)) {
                for ancestor in node.ancestors() {
                    if !selected.contains(ancestor) {
                        states.insert(ancestor.clone(), CheckedState::Indeterminate);
                    }
                }
            }
        }
        Self { states }
    }

    /// The state of `id`. Unknown ids are unchecked.
    #[must_use]
    pub fn get(&self, id: &NodeId) -> CheckedState {
        self.states.get(id).copied().unwrap_or_default()
    }

    /// Iterates `(id, state)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, CheckedState)> + '_ {
        self.states.iter().map(|(id, state)| (id, *state))
    }
}

/// Selects `node`, propagating per `config`.
///
/// The caller has already checked that the node is enabled.
pub(crate) fn select_node<N: Normalizer>(
    forest: &Forest<N>,
    selected: &mut SelectedIds,
    config: &TreeSelectConfig,
    node: &Node,
) {
    if config.is_single() || config.disable_branch_nodes {
        selected.insert(node.id().clone());
        return;
    }

    if config.flat {
        selected.insert(node.id().clone());
        if config.auto_select_ancestors {
            for ancestor in node.ancestors().iter().filter_map(|id| forest.node(id)) {
                if !ancestor.is_disabled() {
                    selected.insert(ancestor.id().clone());
                }
            }
        } else if config.auto_select_descendants {
            for descendant in forest.descendants(node.id()) {
                if !descendant.is_disabled() {
                    selected.insert(descendant.id().clone());
                }
            }
        }
        return;
    }

    let allow_disabled = config.allow_selecting_disabled_descendants;
    let fully_checked = node.is_leaf() || !node.has_disabled_descendants() || allow_disabled;
    if fully_checked {
        selected.insert(node.id().clone());
    }
    for descendant in forest.descendants(node.id()) {
        if !descendant.is_disabled() || allow_disabled {
            selected.insert(descendant.id().clone());
        }
    }
    if fully_checked {
        for ancestor in node.ancestors().iter().filter_map(|id| forest.node(id)) {
            if ancestor.children().iter().all(|child| selected.contains(child)) {
                selected.insert(ancestor.id().clone());
            } else {
                break;
            }
        }
    }
}

/// Deselects `node`, propagating per `config`.
///
/// The caller has already checked that the node is enabled.
pub(crate) fn deselect_node<N: Normalizer>(
    forest: &Forest<N>,
    selected: &mut SelectedIds,
    config: &TreeSelectConfig,
    node: &Node,
) {
    if config.is_single() || config.disable_branch_nodes {
        selected.remove(node.id());
        return;
    }

    if config.flat {
        selected.remove(node.id());
        if config.auto_deselect_ancestors {
            for ancestor in node.ancestors().iter().filter_map(|id| forest.node(id)) {
                if !ancestor.is_disabled() {
                    selected.remove(ancestor.id());
                }
            }
        } else if config.auto_deselect_descendants {
            for descendant in forest.descendants(node.id()) {
                if !descendant.is_disabled() {
                    selected.remove(descendant.id());
                }
            }
        }
        return;
    }

    let allow_disabled = config.allow_selecting_disabled_descendants;
    let mut unchecked_some = false;
    for descendant in forest.descendants(node.id()) {
        if !descendant.is_disabled() || allow_disabled {
            selected.remove(descendant.id());
            unchecked_some = true;
        }
    }
    if node.is_leaf() || unchecked_some || node.children().is_empty() {
        selected.remove(node.id());
        for ancestor in node.ancestors() {
            if !selected.remove(ancestor) {
                break;
            }
        }
    }
}

/// Restores the subtree invariant after the selection or the tree changed
/// underneath it.
///
/// Descendants of selected branches are selected, then every loaded branch
/// whose children are all selected is selected, bottom-up. Only meaningful
/// when selection propagates.
pub(crate) fn complete_selection<N: Normalizer>(forest: &Forest<N>, selected: &mut SelectedIds) {
    let mut queue: VecDeque<NodeId> = selected
        .iter()
        .filter(|id| forest.node(id).is_some_and(Node::is_branch))
        .cloned()
        .collect();
    while let Some(id) = queue.pop_front() {
        for child in forest.node(&id).map(Node::children).unwrap_or_default() {
            if selected.insert(child.clone()) {
                queue.push_back(child.clone());
            }
        }
    }

    let order: Vec<&Node> = forest.pre_order().collect();
    for node in order.into_iter().rev() {
        let children = node.children();
        if !children.is_empty()
            && !selected.contains(node.id())
            && children.iter().all(|child| selected.contains(child))
        {
            selected.insert(node.id().clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use serde_json::{Value, json};
    use understory_forest::{BuildOptions, JsonNormalizer};

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn forest(source: Value) -> Forest<JsonNormalizer> {
        let mut forest = Forest::new(JsonNormalizer::new(), BuildOptions::default());
        let Value::Array(items) = source else {
            panic!("options must be an array");
        };
        let _ = forest.rebuild(items, &[]);
        forest
    }

    fn multi() -> TreeSelectConfig {
        TreeSelectConfig {
            multiple: true,
            ..TreeSelectConfig::default()
        }
    }

    fn tree() -> Forest<JsonNormalizer> {
        forest(json!([
            { "id": "a", "children": [
                { "id": "aa", "children": [{ "id": "aaa" }, { "id": "aab" }] },
                { "id": "ab" },
            ]},
            { "id": "b" },
        ]))
    }

    fn toggle(f: &Forest<JsonNormalizer>, sel: &mut SelectedIds, config: &TreeSelectConfig, name: &str) {
        let node = f.node(&id(name)).unwrap();
        if sel.contains(node.id()) {
            deselect_node(f, sel, config, node);
        } else {
            select_node(f, sel, config, node);
        }
    }

    #[test]
    fn selecting_a_branch_checks_its_subtree() {
        let f = tree();
        let config = multi();
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "aa");
        assert_eq!(sel.items(), &[id("aa"), id("aaa"), id("aab")]);

        let states = CheckedStates::build(&f, &sel, &config);
        assert_eq!(states.get(&id("aa")), CheckedState::Checked);
        assert_eq!(states.get(&id("a")), CheckedState::Indeterminate);
        assert_eq!(states.get(&id("ab")), CheckedState::Unchecked);
        assert_eq!(states.get(&id("b")), CheckedState::Unchecked);
    }

    #[test]
    fn completing_siblings_checks_the_parent() {
        let f = tree();
        let config = multi();
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "aaa");
        toggle(&f, &mut sel, &config, "aab");
        assert!(sel.contains(&id("aa")));
        assert!(!sel.contains(&id("a")));
        toggle(&f, &mut sel, &config, "ab");
        assert!(sel.contains(&id("a")));
    }

    #[test]
    fn deselecting_a_leaf_unchecks_selected_ancestors() {
        let f = tree();
        let config = multi();
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "a");
        assert_eq!(sel.len(), 5);
        toggle(&f, &mut sel, &config, "aab");
        assert_eq!(sel.items(), &[id("ab"), id("aaa")]);
        let states = CheckedStates::build(&f, &sel, &config);
        assert_eq!(states.get(&id("a")), CheckedState::Indeterminate);
        assert_eq!(states.get(&id("aa")), CheckedState::Indeterminate);
    }

    #[test]
    fn double_toggle_restores_states() {
        let f = tree();
        let config = multi();
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "ab");
        let before = CheckedStates::build(&f, &sel, &config);
        toggle(&f, &mut sel, &config, "aa");
        toggle(&f, &mut sel, &config, "aa");
        assert_eq!(CheckedStates::build(&f, &sel, &config), before);
    }

    #[test]
    fn disabled_descendants_follow_policy() {
        let f = forest(json!([
            { "id": "a", "children": [
                { "id": "aa", "isDisabled": true, "children": [{ "id": "aaa" }] },
                { "id": "ab", "isDisabled": true },
                { "id": "ac" },
            ]},
        ]));
        let mut config = multi();
        let mut sel = SelectedIds::new();
        select_node(&f, &mut sel, &config, f.node(&id("a")).unwrap());
        assert_eq!(sel.items(), &[id("ac")]);

        sel.replace_with(vec![id("a"), id("aa"), id("ab"), id("ac"), id("aaa")]);
        deselect_node(&f, &mut sel, &config, f.node(&id("a")).unwrap());
        assert_eq!(sel.items(), &[id("aa"), id("ab"), id("aaa")]);

        config.allow_selecting_disabled_descendants = true;
        sel.clear();
        select_node(&f, &mut sel, &config, f.node(&id("a")).unwrap());
        assert_eq!(sel.len(), 5);
        deselect_node(&f, &mut sel, &config, f.node(&id("a")).unwrap());
        assert!(sel.is_empty());
    }

    #[test]
    fn sub_branch_with_only_disabled_gaps_is_checked() {
        let f = forest(json!([
            { "id": "a", "children": [
                { "id": "aa", "children": [{ "id": "aaa" }, { "id": "aab", "isDisabled": true }] },
            ]},
        ]));
        let config = multi();
        let mut sel = SelectedIds::new();
        select_node(&f, &mut sel, &config, f.node(&id("a")).unwrap());
        assert_eq!(sel.items(), &[id("aa"), id("aaa")]);
        let states = CheckedStates::build(&f, &sel, &config);
        assert_eq!(states.get(&id("aa")), CheckedState::Checked);
        assert_eq!(states.get(&id("aab")), CheckedState::Unchecked);
        assert_eq!(states.get(&id("a")), CheckedState::Indeterminate);

        deselect_node(&f, &mut sel, &config, f.node(&id("aa")).unwrap());
        assert!(sel.is_empty());
    }

    #[test]
    fn flat_mode_auto_propagation() {
        let f = tree();
        let mut config = TreeSelectConfig {
            multiple: true,
            flat: true,
            ..TreeSelectConfig::default()
        };
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "aa");
        assert_eq!(sel.items(), &[id("aa")]);
        let states = CheckedStates::build(&f, &sel, &config);
        assert_eq!(states.get(&id("a")), CheckedState::Unchecked);

        config.auto_select_ancestors = true;
        toggle(&f, &mut sel, &config, "aaa");
        assert_eq!(sel.items(), &[id("aa"), id("aaa"), id("a")]);

        config.auto_select_ancestors = false;
        config.auto_deselect_descendants = true;
        toggle(&f, &mut sel, &config, "a");
        assert!(sel.is_empty());

        config.auto_deselect_descendants = false;
        config.auto_select_descendants = true;
        toggle(&f, &mut sel, &config, "aa");
        assert_eq!(sel.items(), &[id("aa"), id("aaa"), id("aab")]);

        config.auto_deselect_ancestors = true;
        toggle(&f, &mut sel, &config, "aaa");
        assert_eq!(sel.items(), &[id("aab")]);
    }

    #[test]
    fn single_mode_checks_only_the_selected_node() {
        let f = tree();
        let config = TreeSelectConfig::default();
        let mut sel = SelectedIds::new();
        toggle(&f, &mut sel, &config, "aa");
        assert_eq!(sel.items(), &[id("aa")]);
        let states = CheckedStates::build(&f, &sel, &config);
        assert_eq!(states.get(&id("aa")), CheckedState::Checked);
        assert_eq!(states.get(&id("a")), CheckedState::Unchecked);
        assert_eq!(states.get(&id("aaa")), CheckedState::Unchecked);
    }

    #[test]
    fn complete_selection_fills_subtrees_and_parents() {
        let f = tree();
        let mut sel = SelectedIds::new();
        sel.replace_with(vec![id("aa"), id("ab")]);
        complete_selection(&f, &mut sel);
        assert_eq!(sel.items(), &[id("aa"), id("ab"), id("aaa"), id("aab"), id("a")]);
    }
}
