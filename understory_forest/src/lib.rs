// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_forest --heading-base-level=0

//! Understory Forest: a normalized registry for hierarchical option data.
//!
//! Hierarchical pickers (tree selects, cascaders, outline filters) receive
//! their options as a tree of host-defined objects. This crate turns such a
//! tree into a flat arena keyed by id, where every node carries the metadata
//! the selection and search layers need:
//!
//! - Structure: parent, ancestor chain (nearest first), ordered child ids,
//!   level and index path.
//! - Derived state: inherited disabled flag, descendant counts, lower-cased
//!   search texts, and a nested label for ancestor-aware search.
//! - Lazy loading: a branch may arrive with its children unloaded. Each such
//!   branch carries a [`LoadState`], and loaded children are merged into the
//!   registry without rebuilding anything outside the branch.
//!
//! The shape of raw objects is only known to a [`Normalizer`]. With the
//! `json` feature (on by default) [`JsonNormalizer`] handles
//! [`serde_json::Value`] trees.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use understory_forest::{BuildOptions, Forest, JsonNormalizer, LoadState, NodeId};
//!
//! let options = BuildOptions { can_load_children: true, ..BuildOptions::default() };
//! let mut forest = Forest::new(JsonNormalizer::new(), options);
//! let _ = forest.rebuild(vec![json!({ "id": "fruit", "children": null })], &[]);
//!
//! let fruit = NodeId::from("fruit");
//! assert_eq!(forest.node(&fruit).unwrap().load_state(), Some(&LoadState::Unloaded));
//!
//! // Fetch children elsewhere, then merge them in.
//! assert!(forest.begin_load(&fruit));
//! let _ = forest.merge_children(&fruit, vec![json!({ "id": "apple" }), json!({ "id": "pear" })]);
//!
//! let apple = forest.node(&"apple".into()).unwrap();
//! assert_eq!(apple.ancestors(), &[fruit.clone()]);
//! assert_eq!(forest.node(&fruit).unwrap().count().unwrap().leaf_children, 2);
//! ```
//!
//! ## Rebuilding
//!
//! [`Forest::rebuild`] replaces the whole tree. Expansion and loading state
//! carry over by id, and ids the caller asks to keep (typically the current
//! selection) survive as fallback nodes when they vanish from the new tree.
//! Problems with the data never abort a build; they are returned in a
//! [`BuildReport`] as [`ForestDiagnostic`]s and logged through `tracing`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod diagnostic;
mod forest;
mod id;
mod node;
mod normalize;

pub use diagnostic::ForestDiagnostic;
pub use forest::{BuildOptions, BuildReport, Descendants, Forest, PreOrder};
pub use id::NodeId;
pub use node::{BranchCount, LoadState, Node, NodeFlags};
pub use normalize::{Children, NodeFields, NormalizeError, Normalizer};

#[cfg(feature = "json")]
pub use normalize::JsonNormalizer;
