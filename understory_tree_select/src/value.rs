// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion between the selection and the external value.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use understory_forest::{Forest, Node, NodeId, Normalizer};

use crate::error::{Diagnostic, report};
use crate::{SelectedIds, SortValueBy, TreeSelectConfig, ValueConsistsOf, ValueFormat};

/// The externally visible value of an instance.
///
/// Single-select instances produce the `Id`/`Object` forms and multi-select
/// instances the `Ids`/`Objects` forms. Any form is accepted as input; a
/// single-select instance keeps only the first item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<R> {
    /// Single-select value in id format.
    Id(Option<NodeId>),
    /// Multi-select value in id format.
    Ids(Vec<NodeId>),
    /// Single-select value in object format.
    Object(Option<R>),
    /// Multi-select value in object format.
    Objects(Vec<R>),
}

impl<R> Default for Value<R> {
    fn default() -> Self {
        Self::Id(None)
    }
}

impl<R> Value<R> {
    /// Returns `true` if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Id(id) => usize::from(id.is_some()),
            Self::Object(raw) => usize::from(raw.is_some()),
            Self::Ids(ids) => ids.len(),
            Self::Objects(raws) => raws.len(),
        }
    }
}

/// Reads value items as ids, keeping the raw object for object-format items.
///
/// Objects that fail normalization are dropped with a diagnostic.
pub(crate) fn read_value<N: Normalizer>(
    normalizer: &N,
    value: Value<N::Raw>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(NodeId, Option<N::Raw>)> {
    let objects = match value {
        Value::Id(id) => return id.into_iter().map(|id| (id, None)).collect(),
        Value::Ids(ids) => return ids.into_iter().map(|id| (id, None)).collect(),
        Value::Object(raw) => raw.into_iter().collect(),
        Value::Objects(raws) => raws,
    };
    objects
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match normalizer.normalize(&raw) {
            Ok(fields) => Some((fields.id, Some(raw))),
            Err(source) => {
                report(diagnostics, Diagnostic::InvalidValueItem { index, source });
                None
            }
        })
        .collect()
}

/// Expands value ids into the full set of selected ids.
///
/// Every id must already be known to `forest`, as a tree or fallback node.
pub(crate) fn selection_from_value<N: Normalizer>(
    forest: &Forest<N>,
    config: &TreeSelectConfig,
    value: &[NodeId],
) -> Vec<NodeId> {
    if config.is_single() {
        return value.iter().take(1).cloned().collect();
    }
    if config.flat || config.disable_branch_nodes {
        return value.to_vec();
    }
    match config.value_consists_of {
        ValueConsistsOf::All => value.to_vec(),
        ValueConsistsOf::BranchPriority => {
            let mut ids = Vec::new();
            for id in value {
                ids.push(id.clone());
                ids.extend(forest.descendants(id).map(|n| n.id().clone()));
            }
            ids
        }
        ValueConsistsOf::LeafPriority => complete_upwards(forest, value.to_vec()),
        ValueConsistsOf::AllWithIndeterminate => {
            // Ancestors stored as indeterminate must be re-derived, not trusted;
            // start from the ids that have no descendant in the value.
            let present: HashSet<&NodeId> = value.iter().collect();
            let mut covered: HashSet<&NodeId> = HashSet::new();
            for node in value.iter().filter_map(|id| forest.node(id)) {
                covered.extend(node.ancestors().iter().filter(|a| present.contains(a)));
            }
            let start = value.iter().filter(|id| !covered.contains(id)).cloned().collect();
            complete_upwards(forest, start)
        }
    }
}

/// Selects each parent once all of its children have been seen.
fn complete_upwards<N: Normalizer>(forest: &Forest<N>, start: Vec<NodeId>) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut remaining: HashMap<NodeId, usize> = HashMap::new();
    let mut queue: VecDeque<NodeId> = start.into();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        ids.push(id.clone());
        let Some(parent) = forest
            .node(&id)
            .and_then(Node::parent)
            .and_then(|p| forest.node(p))
        else {
            continue;
        };
        let left = remaining
            .entry(parent.id().clone())
            .or_insert_with(|| parent.children().len());
        *left = left.saturating_sub(1);
        if *left == 0 {
            queue.push_back(parent.id().clone());
        }
    }
    ids
}

/// Derives the ordered value ids from the selection.
pub(crate) fn internal_value<N: Normalizer>(
    forest: &Forest<N>,
    selected: &SelectedIds,
    config: &TreeSelectConfig,
) -> Vec<NodeId> {
    let verbatim = config.is_single()
        || config.flat
        || config.disable_branch_nodes
        || config.value_consists_of == ValueConsistsOf::All;
    let mut ids: Vec<NodeId> = if verbatim {
        selected.items().to_vec()
    } else {
        match config.value_consists_of {
            ValueConsistsOf::BranchPriority => selected
                .iter()
                .filter(|id| {
                    forest
                        .node(id)
                        .and_then(Node::parent)
                        .is_none_or(|parent| !selected.contains(parent))
                })
                .cloned()
                .collect(),
            ValueConsistsOf::LeafPriority => selected
                .iter()
                .filter(|id| forest.node(id).is_none_or(|n| n.children().is_empty()))
                .cloned()
                .collect(),
            ValueConsistsOf::AllWithIndeterminate | ValueConsistsOf::All => {
                let mut ids = selected.items().to_vec();
                let mut indeterminate = HashSet::new();
                for node in selected.iter().filter_map(|id| forest.node(id)) {
                    for ancestor in node.ancestors() {
                        if !selected.contains(ancestor) && indeterminate.insert(ancestor) {
                            ids.push(ancestor.clone());
                        }
                    }
                }
                ids
            }
        }
    };
    sort_value(forest, config.sort_value_by, &mut ids);
    ids
}

fn sort_value<N: Normalizer>(forest: &Forest<N>, by: SortValueBy, ids: &mut [NodeId]) {
    match by {
        SortValueBy::OrderSelected => {}
        SortValueBy::Level => {
            ids.sort_by_key(|id| forest.node(id).map_or(0, Node::level));
        }
        SortValueBy::Index => ids.sort_by(|a, b| {
            match (forest.node(a), forest.node(b)) {
                (Some(a), Some(b)) => a.index_path().cmp(b.index_path()),
                _ => Ordering::Equal,
            }
        }),
    }
}

/// Renders value ids in the configured format.
pub(crate) fn external_value<N: Normalizer>(
    forest: &Forest<N>,
    config: &TreeSelectConfig,
    ids: &[NodeId],
) -> Value<N::Raw> {
    let object = |id: &NodeId| {
        forest
            .raw(id)
            .cloned()
            .unwrap_or_else(|| forest.normalizer().synthesize(id))
    };
    match (config.value_format, config.is_single()) {
        (ValueFormat::Id, true) => Value::Id(ids.first().cloned()),
        (ValueFormat::Id, false) => Value::Ids(ids.to_vec()),
        (ValueFormat::Object, true) => Value::Object(ids.first().map(object)),
        (ValueFormat::Object, false) => Value::Objects(ids.iter().map(object).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use serde_json::json;
    use understory_forest::{BuildOptions, JsonNormalizer, NormalizeError};

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|name| id(name)).collect()
    }

    fn tree() -> Forest<JsonNormalizer> {
        let mut forest = Forest::new(JsonNormalizer::new(), BuildOptions::default());
        let _ = forest.rebuild(
            vec![
                json!({ "id": "a", "children": [
                    { "id": "aa", "children": [{ "id": "aaa" }, { "id": "aab" }] },
                    { "id": "ab" },
                    { "id": "ac", "children": [] },
                ]}),
                json!({ "id": "b" }),
            ],
            &[],
        );
        forest
    }

    fn multi(consists_of: ValueConsistsOf) -> TreeSelectConfig {
        TreeSelectConfig {
            multiple: true,
            value_consists_of: consists_of,
            ..TreeSelectConfig::default()
        }
    }

    fn selected(names: &[&str]) -> SelectedIds {
        let mut sel = SelectedIds::new();
        sel.replace_with(ids(names));
        sel
    }

    #[test]
    fn encode_by_consists_of() {
        let f = tree();
        let sel = selected(&["aa", "aaa", "aab", "ab"]);
        assert_eq!(
            internal_value(&f, &sel, &multi(ValueConsistsOf::All)),
            ids(&["aa", "aaa", "aab", "ab"])
        );
        assert_eq!(
            internal_value(&f, &sel, &multi(ValueConsistsOf::BranchPriority)),
            ids(&["aa", "ab"])
        );
        assert_eq!(
            internal_value(&f, &sel, &multi(ValueConsistsOf::LeafPriority)),
            ids(&["aaa", "aab", "ab"])
        );
        assert_eq!(
            internal_value(&f, &sel, &multi(ValueConsistsOf::AllWithIndeterminate)),
            ids(&["aa", "aaa", "aab", "ab", "a"])
        );
    }

    #[test]
    fn childless_branch_counts_as_leaf() {
        let f = tree();
        let sel = selected(&["ac"]);
        assert_eq!(
            internal_value(&f, &sel, &multi(ValueConsistsOf::LeafPriority)),
            ids(&["ac"])
        );
    }

    #[test]
    fn decode_by_consists_of() {
        let f = tree();
        assert_eq!(
            selection_from_value(&f, &multi(ValueConsistsOf::BranchPriority), &ids(&["aa", "b"])),
            ids(&["aa", "aaa", "aab", "b"])
        );
        assert_eq!(
            selection_from_value(
                &f,
                &multi(ValueConsistsOf::LeafPriority),
                &ids(&["aaa", "aab", "ab", "ac"])
            ),
            ids(&["aaa", "aab", "ab", "ac", "aa", "a"])
        );
        assert_eq!(
            selection_from_value(
                &f,
                &multi(ValueConsistsOf::AllWithIndeterminate),
                &ids(&["aaa", "a"])
            ),
            ids(&["aaa"])
        );
    }

    #[test]
    fn decode_then_encode_is_stable() {
        let f = tree();
        for consists_of in [
            ValueConsistsOf::All,
            ValueConsistsOf::BranchPriority,
            ValueConsistsOf::LeafPriority,
            ValueConsistsOf::AllWithIndeterminate,
        ] {
            let config = multi(consists_of);
            let sel = selected(&["ab", "aaa"]);
            let value = internal_value(&f, &sel, &config);
            let mut again = SelectedIds::new();
            again.replace_with(selection_from_value(&f, &config, &value));
            assert_eq!(internal_value(&f, &again, &config), value, "{consists_of:?}");
        }
    }

    #[test]
    fn single_mode_keeps_first_item() {
        let f = tree();
        let config = TreeSelectConfig::default();
        assert_eq!(selection_from_value(&f, &config, &ids(&["aa", "b"])), ids(&["aa"]));
    }

    #[test]
    fn sort_by_level_and_index() {
        let f = tree();
        let sel = selected(&["aab", "b", "aa", "ab"]);
        let mut config = multi(ValueConsistsOf::All);

        config.sort_value_by = SortValueBy::Level;
        assert_eq!(internal_value(&f, &sel, &config), ids(&["b", "aa", "ab", "aab"]));

        config.sort_value_by = SortValueBy::Index;
        assert_eq!(internal_value(&f, &sel, &config), ids(&["aa", "aab", "ab", "b"]));
    }

    #[test]
    fn fallback_nodes_sort_first_by_index() {
        let mut f = tree();
        assert!(f.insert_fallback(id("zz"), None));
        let sel = selected(&["b", "zz"]);
        let config = TreeSelectConfig {
            sort_value_by: SortValueBy::Index,
            ..multi(ValueConsistsOf::All)
        };
        assert_eq!(internal_value(&f, &sel, &config), ids(&["zz", "b"]));
    }

    #[test]
    fn object_values_are_read_through_the_normalizer() {
        let f = tree();
        let mut diagnostics = Vec::new();
        let items = read_value(
            f.normalizer(),
            Value::Objects(vec![json!({ "id": "x", "label": "X" }), json!({ "label": "nope" })]),
            &mut diagnostics,
        );
        assert_eq!(items, vec![(id("x"), Some(json!({ "id": "x", "label": "X" })))]);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::InvalidValueItem {
                index: 1,
                source: NormalizeError::MissingId { key: "id".into() },
            }]
        );
    }

    #[test]
    fn external_value_formats() {
        let f = tree();
        let mut config = multi(ValueConsistsOf::All);
        assert_eq!(
            external_value(&f, &config, &ids(&["b"])),
            Value::Ids(ids(&["b"]))
        );
        config.value_format = ValueFormat::Object;
        assert_eq!(
            external_value(&f, &config, &ids(&["b"])),
            Value::Objects(vec![json!({ "id": "b" })])
        );
        config.multiple = false;
        assert_eq!(
            external_value(&f, &config, &[]),
            Value::<serde_json::Value>::Object(None)
        );
        assert!(Value::<serde_json::Value>::default().is_empty());
    }
}
