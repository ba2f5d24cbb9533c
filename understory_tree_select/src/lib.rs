// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tree_select --heading-base-level=0

//! Understory Tree Select: selection state for hierarchical select widgets.
//!
//! A [`TreeSelect`] owns everything a tree-shaped dropdown needs besides
//! rendering:
//!
//! - The option registry, an [`understory_forest::Forest`] built from raw
//!   host objects through a [`Normalizer`](understory_forest::Normalizer).
//! - The selection, with tri-state [`CheckedState`]s that propagate between
//!   branches and their descendants (or not, in flat mode).
//! - The external [`Value`], encoded per [`ValueConsistsOf`] and ordered per
//!   [`SortValueBy`], and decoded back with fallback nodes for unknown ids.
//! - Local search as a [`SearchOverlay`], or async search through the loader
//!   with a per-query cache.
//! - Lazy loading of root options and branch children through an
//!   [`OptionsLoader`], with one request in flight per scope.
//!
//! The widget is driven by calling methods on the instance, and reports back
//! through [`Event`]s and [`Diagnostic`]s that the host drains.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use understory_tree_select::understory_forest::{JsonNormalizer, NodeId};
//! use understory_tree_select::{
//!     CheckedState, Event, LoadAction, LoadResponse, TreeSelect, TreeSelectConfig, Value,
//! };
//!
//! let config = TreeSelectConfig { multiple: true, ..TreeSelectConfig::default() };
//! let mut select = TreeSelect::builder(JsonNormalizer::new())
//!     .config(config)
//!     .options(vec![json!({ "id": "fruit", "label": "Fruit", "children": null })])
//!     .loader(|request: understory_tree_select::LoadRequest<serde_json::Value>| {
//!         match request.action {
//!             LoadAction::LoadChildrenOptions { .. } => LoadResponse::Ready(Ok(vec![
//!                 json!({ "id": "apple", "label": "Apple" }),
//!                 json!({ "id": "pear", "label": "Pear" }),
//!             ])),
//!             _ => LoadResponse::Pending,
//!         }
//!     })
//!     .build();
//!
//! // Expanding the unloaded branch fetches its children.
//! select.toggle_expanded(&"fruit".into());
//! select.toggle(&"apple".into());
//! assert_eq!(select.checked_state(&"fruit".into()), CheckedState::Indeterminate);
//!
//! select.toggle(&"pear".into());
//! assert_eq!(select.value(), Value::Ids(vec![NodeId::from("fruit")]));
//! assert!(select.drain_events().contains(&Event::Input(select.value())));
//! ```
//!
//! ## Searching
//!
//! Typed text goes through [`TreeSelect::input_search`] with a timestamp and
//! is applied by [`TreeSelect::tick`] once it has been stable for
//! [`INPUT_DEBOUNCE_DELAY_MS`]. Local search never touches the regular
//! expansion of nodes, so clearing the query restores the tree as it was.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub use understory_forest;

mod checked;
mod config;
mod debounce;
mod error;
mod event;
mod loader;
mod router;
mod search;
mod selection;
mod tree_select;
mod value;

pub use checked::{CheckedState, CheckedStates};
pub use config::{SortValueBy, TreeSelectConfig, ValueConsistsOf, ValueFormat};
pub use debounce::{Debouncer, INPUT_DEBOUNCE_DELAY_MS};
pub use error::{Diagnostic, LoadError, ResolveError, RouteError};
pub use event::Event;
pub use loader::{LoadAction, LoadRequest, LoadResponse, LoadTicket, OptionsLoader};
pub use router::{InstanceId, InstanceRouter, SharedTreeSelect};
pub use search::{SearchOptions, SearchOverlay, VisibleRow, fuzzy_match, visible_rows};
pub use selection::SelectedIds;
pub use tree_select::{RemoteEntry, TreeSelect, TreeSelectBuilder};
pub use value::Value;
