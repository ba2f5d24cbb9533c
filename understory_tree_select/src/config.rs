// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instance configuration.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use serde::Deserialize;
use understory_forest::BuildOptions;

use crate::error::{Diagnostic, report};

/// Which selected ids make up the external value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueConsistsOf {
    /// Every selected id.
    All,
    /// A fully checked branch stands for itself and its descendants.
    #[default]
    BranchPriority,
    /// Only leaves (and childless branches).
    LeafPriority,
    /// Every selected id plus indeterminate ancestors.
    AllWithIndeterminate,
}

/// Order of ids in the external value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortValueBy {
    /// The order in which nodes were selected.
    #[default]
    OrderSelected,
    /// Shallowest first, selection order within a level.
    Level,
    /// Document order.
    Index,
}

/// Shape of the items in the external value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    /// Node ids.
    #[default]
    Id,
    /// Raw option objects.
    Object,
}

/// Configuration of a tree select instance.
///
/// Deserializes from camelCase keys; omitted keys take their defaults.
///
/// ```
/// use understory_tree_select::{TreeSelectConfig, ValueConsistsOf};
///
/// let config: TreeSelectConfig = serde_json::from_str(
///     r#"{ "multiple": true, "valueConsistsOf": "LEAF_PRIORITY", "matchKeys": ["label", "id"] }"#,
/// )
/// .unwrap();
/// assert!(config.multiple);
/// assert_eq!(config.value_consists_of, ValueConsistsOf::LeafPriority);
/// assert!(config.searchable);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeSelectConfig {
    /// Allow more than one selected node.
    pub multiple: bool,
    /// Each node's checked state is independent of its relatives.
    /// Requires `multiple`.
    pub flat: bool,
    /// Branch nodes cannot be selected; selection does not propagate.
    pub disable_branch_nodes: bool,
    /// Branches shallower than this level start expanded.
    pub default_expand_level: usize,
    /// Place branches before leaves within each sibling group.
    pub branch_nodes_first: bool,
    /// Which selected ids make up the value.
    pub value_consists_of: ValueConsistsOf,
    /// Order of ids in the value.
    pub sort_value_by: SortValueBy,
    /// Shape of value items.
    pub value_format: ValueFormat,
    /// Enable searching.
    pub searchable: bool,
    /// Match queries as plain substrings instead of subsequences.
    pub disable_fuzzy_matching: bool,
    /// Multi-word queries match against ancestor labels too.
    pub search_nested: bool,
    /// Node fields searched, e.g. `label` or `id`.
    pub match_keys: Vec<String>,
    /// Show search results as a single flat list.
    pub flatten_search_results: bool,
    /// Search through the loader instead of filtering locally.
    #[serde(rename = "async")]
    pub async_search: bool,
    /// Flat mode: selecting a node also selects its ancestors.
    pub auto_select_ancestors: bool,
    /// Flat mode: selecting a node also selects its descendants.
    pub auto_select_descendants: bool,
    /// Flat mode: deselecting a node also deselects its ancestors.
    pub auto_deselect_ancestors: bool,
    /// Flat mode: deselecting a node also deselects its descendants.
    pub auto_deselect_descendants: bool,
    /// Clearing also removes disabled selected nodes.
    pub allow_clearing_disabled: bool,
    /// Selecting a branch may change its disabled descendants.
    pub allow_selecting_disabled_descendants: bool,
    /// Reuse loaded async search results for repeated queries.
    pub cache_options: bool,
    /// Fetch root options as soon as the instance is built if they are unset.
    pub auto_load_root_options: bool,
    /// Async search: fetch options for the empty query instead of showing
    /// nothing (or the provided default options).
    #[serde(rename = "defaultOptions")]
    pub load_default_options: bool,
    /// Reset the search query after each selection in multi-select mode.
    /// Single-select mode always does.
    pub clear_on_select: bool,
    /// Close the menu after a selection in single-select mode.
    pub close_on_select: bool,
}

impl Default for TreeSelectConfig {
    fn default() -> Self {
        Self {
            multiple: false,
            flat: false,
            disable_branch_nodes: false,
            default_expand_level: 0,
            branch_nodes_first: false,
            value_consists_of: ValueConsistsOf::default(),
            sort_value_by: SortValueBy::default(),
            value_format: ValueFormat::default(),
            searchable: true,
            disable_fuzzy_matching: false,
            search_nested: false,
            match_keys: vec!["label".into()],
            flatten_search_results: false,
            async_search: false,
            auto_select_ancestors: false,
            auto_select_descendants: false,
            auto_deselect_ancestors: false,
            auto_deselect_descendants: false,
            allow_clearing_disabled: false,
            allow_selecting_disabled_descendants: false,
            cache_options: true,
            auto_load_root_options: true,
            load_default_options: false,
            clear_on_select: false,
            close_on_select: true,
        }
    }
}

impl TreeSelectConfig {
    /// Returns the configuration with inconsistent combinations replaced by
    /// their nearest sane default, reporting each replacement.
    #[must_use]
    pub fn validated(&self, diagnostics: &mut Vec<Diagnostic>) -> Self {
        let mut effective = self.clone();
        if effective.async_search && !effective.searchable {
            report(diagnostics, Diagnostic::AsyncSearchNotSearchable);
            effective.searchable = true;
        }
        if effective.flat && !effective.multiple {
            report(diagnostics, Diagnostic::FlatWithoutMultiple);
            effective.flat = false;
        }
        if !effective.flat {
            for (option, flag) in [
                ("autoSelectAncestors", &mut effective.auto_select_ancestors),
                ("autoSelectDescendants", &mut effective.auto_select_descendants),
                ("autoDeselectAncestors", &mut effective.auto_deselect_ancestors),
                ("autoDeselectDescendants", &mut effective.auto_deselect_descendants),
            ] {
                if *flag {
                    report(diagnostics, Diagnostic::FlatOnlyOption { option });
                    *flag = false;
                }
            }
        }
        if effective.match_keys.is_empty() {
            effective.match_keys.push("label".into());
        }
        effective
    }

    /// Returns `true` in single-select mode.
    #[must_use]
    pub fn is_single(&self) -> bool {
        !self.multiple
    }

    /// Returns `true` when selecting a branch propagates to its relatives.
    #[must_use]
    pub fn propagates(&self) -> bool {
        self.multiple && !self.flat && !self.disable_branch_nodes
    }

    /// The registry options this configuration implies.
    #[must_use]
    pub fn build_options(&self, can_load_children: bool) -> BuildOptions {
        BuildOptions {
            flat: self.flat,
            branch_nodes_first: self.branch_nodes_first,
            default_expand_level: self.default_expand_level,
            match_keys: self.match_keys.clone(),
            can_load_children,
        }
    }
}
