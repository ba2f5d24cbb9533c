// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-instance selection context.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use hashbrown::HashMap;
use understory_forest::{BuildReport, Forest, LoadState, Node, NodeId, Normalizer};

use crate::checked::{complete_selection, deselect_node, select_node};
use crate::error::report;
use crate::loader::{LoadScope, PendingLoads};
use crate::search::{SearchOptions, VisibleRow, visible_rows};
use crate::value::{external_value, internal_value, read_value, selection_from_value};
use crate::{
    CheckedState, CheckedStates, Debouncer, Diagnostic, Event, InstanceId, LoadAction, LoadError,
    LoadRequest, LoadResponse, LoadTicket, OptionsLoader, ResolveError, SearchOverlay, SelectedIds,
    TreeSelectConfig, Value,
};

/// Cached async search results for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry<R> {
    load: LoadState,
    options: Vec<R>,
}

impl<R> Default for RemoteEntry<R> {
    fn default() -> Self {
        Self {
            load: LoadState::Unloaded,
            options: Vec::new(),
        }
    }
}

impl<R> RemoteEntry<R> {
    /// Loading status of the query.
    #[must_use]
    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    /// Options returned for the query.
    #[must_use]
    pub fn options(&self) -> &[R] {
        &self.options
    }
}

/// Builder for [`TreeSelect`].
pub struct TreeSelectBuilder<N: Normalizer> {
    normalizer: N,
    config: TreeSelectConfig,
    options: Option<Vec<N::Raw>>,
    default_options: Option<Vec<N::Raw>>,
    value: Value<N::Raw>,
    loader: Option<Box<dyn OptionsLoader<N::Raw>>>,
}

impl<N: Normalizer> fmt::Debug for TreeSelectBuilder<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSelectBuilder")
            .field("config", &self.config)
            .field("options", &self.options.as_ref().map(Vec::len))
            .field("has_loader", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

impl<N: Normalizer> TreeSelectBuilder<N> {
    /// Starts a builder with default configuration and unset options.
    #[must_use]
    pub fn new(normalizer: N) -> Self {
        Self {
            normalizer,
            config: TreeSelectConfig::default(),
            options: None,
            default_options: None,
            value: Value::default(),
            loader: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: TreeSelectConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the root options. Without them the root options are unset and
    /// fetched through the loader.
    #[must_use]
    pub fn options(mut self, options: Vec<N::Raw>) -> Self {
        self.options = Some(options);
        self
    }

    /// Async search: options shown for the empty query.
    #[must_use]
    pub fn default_options(mut self, options: Vec<N::Raw>) -> Self {
        self.default_options = Some(options);
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn value(mut self, value: Value<N::Raw>) -> Self {
        self.value = value;
        self
    }

    /// Sets the options loader.
    #[must_use]
    pub fn loader(mut self, loader: impl OptionsLoader<N::Raw> + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Builds the instance.
    ///
    /// Root options are requested right away when they are unset and
    /// `auto_load_root_options` is on; in async search mode the empty query
    /// is resolved instead. No `Input` event is emitted for the initial value.
    pub fn build(self) -> TreeSelect<N> {
        let mut diagnostics = Vec::new();
        let config = self.config.validated(&mut diagnostics);
        let forest = Forest::new(
            self.normalizer,
            config.build_options(self.loader.is_some()),
        );
        let mut select = TreeSelect {
            id: InstanceId::next(),
            config,
            forest,
            root_load: LoadState::Unloaded,
            selected: SelectedIds::new(),
            checked: CheckedStates::default(),
            internal_value: Vec::new(),
            loader: self.loader,
            pending: PendingLoads::default(),
            remote: HashMap::new(),
            default_options: self.default_options,
            search_query: String::new(),
            input: Debouncer::default(),
            search: None,
            menu_open: false,
            events: Vec::new(),
            diagnostics,
        };

        let mut build = BuildReport::default();
        let options_set = self.options.is_some();
        if let Some(options) = self.options.filter(|_| !select.config.async_search) {
            select.root_load.succeed();
            build = select.forest.rebuild(options, &[]);
        }
        select.decode_value(self.value);
        if select.config.propagates() {
            complete_selection(&select.forest, &mut select.selected);
        }
        select.commit(false);
        tracing::debug!(instance = %select.id, nodes = select.forest.len(), "built tree select");
        select.absorb(build);

        if select.config.async_search {
            if select.loader.is_none() {
                report(&mut select.diagnostics, Diagnostic::OptionsWithoutLoader);
            }
            select.handle_remote_search();
        } else if !options_set {
            if select.loader.is_none() {
                report(&mut select.diagnostics, Diagnostic::OptionsWithoutLoader);
            } else if select.config.auto_load_root_options {
                select.load_root_options();
            }
        }
        select
    }
}

/// Selection state of one tree select widget.
///
/// All mutation goes through methods on this type; it is the explicit
/// context object for every operation. Derived state (checked states, the
/// value, the search overlay) is brought up to date before each method
/// returns.
///
/// ```
/// use serde_json::json;
/// use understory_tree_select::{CheckedState, TreeSelect, TreeSelectConfig, Value};
/// use understory_tree_select::understory_forest::{JsonNormalizer, NodeId};
///
/// let mut select = TreeSelect::builder(JsonNormalizer::new())
///     .config(TreeSelectConfig { multiple: true, ..TreeSelectConfig::default() })
///     .options(vec![
///         json!({ "id": "a", "children": [{ "id": "aa" }, { "id": "ab" }] }),
///         json!({ "id": "b" }),
///     ])
///     .build();
///
/// select.toggle(&"aa".into());
/// select.toggle(&"ab".into());
/// assert_eq!(select.value(), Value::Ids(vec![NodeId::from("a")]));
/// assert_eq!(select.checked_state(&"a".into()), CheckedState::Checked);
/// ```
pub struct TreeSelect<N: Normalizer> {
    id: InstanceId,
    config: TreeSelectConfig,
    forest: Forest<N>,
    root_load: LoadState,
    selected: SelectedIds,
    checked: CheckedStates,
    internal_value: Vec<NodeId>,
    loader: Option<Box<dyn OptionsLoader<N::Raw>>>,
    pending: PendingLoads,
    remote: HashMap<String, RemoteEntry<N::Raw>>,
    default_options: Option<Vec<N::Raw>>,
    search_query: String,
    input: Debouncer<String>,
    search: Option<SearchOverlay>,
    menu_open: bool,
    events: Vec<Event<N::Raw>>,
    diagnostics: Vec<Diagnostic>,
}

impl<N: Normalizer> fmt::Debug for TreeSelect<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSelect")
            .field("id", &self.id)
            .field("forest", &self.forest)
            .field("root_load", &self.root_load)
            .field("selected", &self.selected)
            .field("search_query", &self.search_query)
            .field("menu_open", &self.menu_open)
            .finish_non_exhaustive()
    }
}

impl<N: Normalizer> TreeSelect<N> {
    /// Starts building an instance.
    #[must_use]
    pub fn builder(normalizer: N) -> TreeSelectBuilder<N> {
        TreeSelectBuilder::new(normalizer)
    }

    /// Identity of this instance; carried by every load ticket.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &TreeSelectConfig {
        &self.config
    }

    /// The node registry.
    #[must_use]
    pub fn forest(&self) -> &Forest<N> {
        &self.forest
    }

    /// Loading status of the root options.
    #[must_use]
    pub fn root_load_state(&self) -> &LoadState {
        &self.root_load
    }

    /// Every selected id, in selection order.
    #[must_use]
    pub fn selected_ids(&self) -> &SelectedIds {
        &self.selected
    }

    /// Returns `true` if `id` is selected.
    #[must_use]
    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.contains(id)
    }

    /// Checked state of a node.
    #[must_use]
    pub fn checked_state(&self, id: &NodeId) -> CheckedState {
        self.checked.get(id)
    }

    /// Checked states of all nodes.
    #[must_use]
    pub fn checked_states(&self) -> &CheckedStates {
        &self.checked
    }

    /// The value ids, per the configured policy and order.
    #[must_use]
    pub fn internal_value(&self) -> &[NodeId] {
        &self.internal_value
    }

    /// The external value.
    #[must_use]
    pub fn value(&self) -> Value<N::Raw> {
        external_value(&self.forest, &self.config, &self.internal_value)
    }

    /// Returns `true` while the menu is open.
    #[must_use]
    pub fn is_menu_open(&self) -> bool {
        self.menu_open
    }

    /// The applied search query.
    #[must_use]
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// The local search overlay, while a local search is active.
    #[must_use]
    pub fn search_overlay(&self) -> Option<&SearchOverlay> {
        self.search.as_ref()
    }

    /// Cached async search results for `query`.
    #[must_use]
    pub fn remote_entry(&self, query: &str) -> Option<&RemoteEntry<N::Raw>> {
        self.remote.get(query)
    }

    /// Returns `true` while any load request is in flight.
    #[must_use]
    pub fn has_pending_loads(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Rows of the menu in display order.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        visible_rows(
            &self.forest,
            self.search.as_ref(),
            self.config.flatten_search_results,
        )
    }

    /// Takes the queued events.
    pub fn drain_events(&mut self) -> Vec<Event<N::Raw>> {
        mem::take(&mut self.events)
    }

    /// Takes the queued diagnostics.
    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }

    /// Replaces the configuration.
    ///
    /// The selection is kept. Options that shape the tree trigger a rebuild;
    /// switching to single-select keeps only the first value item.
    pub fn set_config(&mut self, config: TreeSelectConfig) {
        let config = config.validated(&mut self.diagnostics);
        let previous = mem::replace(&mut self.config, config);
        let build = self.config.build_options(self.loader.is_some());
        let mut report = BuildReport::default();
        if build != *self.forest.options() {
            self.forest.set_options(build);
            let keep = self.selected.items().to_vec();
            report = self.forest.reshape(&keep);
        }
        if self.config.is_single() && self.selected.len() > 1 {
            let first = self
                .internal_value
                .first()
                .or_else(|| self.selected.items().first())
                .cloned();
            self.selected.replace_with(first);
        }
        if !self.config.searchable {
            self.input.cancel();
            self.search_query.clear();
            self.search = None;
        }
        self.settle(report);

        if previous.async_search != self.config.async_search {
            self.remote.clear();
            if self.config.async_search {
                self.handle_remote_search();
            } else {
                self.root_load = LoadState::Unloaded;
                self.reconcile_by_value(|forest, keep| Some(forest.rebuild(Vec::new(), keep)));
            }
        }
    }

    /// Replaces the root options. `None` marks them unset.
    ///
    /// Expansion, loading state and the value carry over by id. Ignored in
    /// async search mode, where the options come from search results.
    pub fn set_options(&mut self, options: Option<Vec<N::Raw>>) {
        if self.config.async_search {
            tracing::debug!(instance = %self.id, "ignoring root options in async search mode");
            return;
        }
        self.root_load = match options {
            Some(_) => LoadState::Loaded,
            None => LoadState::Unloaded,
        };
        let options = options.unwrap_or_default();
        self.reconcile_by_value(|forest, keep| Some(forest.rebuild(options, keep)));
    }

    /// Async search: replaces the options shown for the empty query.
    pub fn set_default_options(&mut self, options: Option<Vec<N::Raw>>) {
        self.default_options = options;
        if let Some(entry) = self.remote.get_mut("") {
            *entry = RemoteEntry::default();
        }
        if self.config.async_search && self.search_query.is_empty() {
            self.handle_remote_search();
        }
    }

    /// Replaces the loader.
    pub fn set_loader(&mut self, loader: Option<Box<dyn OptionsLoader<N::Raw>>>) {
        self.loader = loader;
        let build = self.config.build_options(self.loader.is_some());
        if build != *self.forest.options() {
            self.forest.set_options(build);
            self.reconcile_by_value(|forest, keep| Some(forest.reshape(keep)));
        }
    }

    /// Replaces the value.
    ///
    /// Ids unknown to the registry become fallback nodes. Emits `Input` if
    /// the resulting value differs from the previous one.
    pub fn set_value(&mut self, value: Value<N::Raw>) {
        self.decode_value(value);
        self.settle(BuildReport::default());
    }

    /// Selects a node unless it is already selected (or, in multi-select
    /// mode, checked or partially checked). Returns `true` if the selection
    /// changed.
    pub fn select(&mut self, id: &NodeId) -> bool {
        match self.next_state(id) {
            Some(true) => self.apply(id, true),
            _ => false,
        }
    }

    /// Deselects a checked or partially checked node. Returns `true` if the
    /// selection changed.
    pub fn deselect(&mut self, id: &NodeId) -> bool {
        match self.next_state(id) {
            Some(false) => self.apply(id, false),
            _ => false,
        }
    }

    /// The user action on a node: selects an unchecked node and deselects a
    /// checked or partially checked one. In single-select mode the node
    /// replaces the selection and stays selected when toggled again.
    ///
    /// Disabled nodes, and branches when branch nodes are disabled, are left
    /// alone. Returns `true` if the action was applied.
    pub fn toggle(&mut self, id: &NodeId) -> bool {
        match self.next_state(id) {
            Some(next) => self.apply(id, next || self.config.is_single()),
            None => false,
        }
    }

    /// Clears the selection. Disabled selected nodes stay selected in
    /// multi-select mode unless clearing them is allowed.
    pub fn clear(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        if self.config.is_single() || self.config.allow_clearing_disabled {
            self.selected.clear();
        } else {
            let forest = &self.forest;
            self.selected
                .retain(|id| forest.node(id).is_some_and(Node::is_disabled));
        }
        self.settle(BuildReport::default());
    }

    /// Removes the last value item: clears in single-select mode, toggles the
    /// last value id otherwise.
    pub fn remove_last_value(&mut self) -> bool {
        if self.config.is_single() {
            let had_value = !self.selected.is_empty();
            self.clear();
            return had_value;
        }
        match self.internal_value.last().cloned() {
            Some(last) => self.toggle(&last),
            None => false,
        }
    }

    /// Flips the expansion of a branch, or its search expansion while a
    /// local search is active. Expanding an unloaded branch loads its
    /// children. Returns the new state.
    pub fn toggle_expanded(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.forest.node(id).filter(|n| n.is_branch()) else {
            return false;
        };
        let (expanded, loaded) = (node.is_expanded(), node.is_loaded());
        let next = match self.search.as_mut() {
            Some(overlay) => overlay.toggle_expanded(id),
            None => {
                self.forest.set_expanded(id, !expanded);
                !expanded
            }
        };
        if next && !loaded {
            self.load_children(id);
        }
        next
    }

    /// Sets the expansion of a branch outside of search. Expanding an
    /// unloaded branch loads its children. Returns `true` if it changed.
    pub fn set_expanded(&mut self, id: &NodeId, expanded: bool) -> bool {
        if !self.forest.set_expanded(id, expanded) {
            return false;
        }
        if expanded && !self.forest.node(id).is_some_and(Node::is_loaded) {
            self.load_children(id);
        }
        true
    }

    /// Requests the children of an unloaded or failed branch.
    ///
    /// Returns `false` if there is no loader, the branch is already loaded,
    /// or a request is in flight.
    pub fn load_children(&mut self, id: &NodeId) -> bool {
        if self.loader.is_none() {
            return false;
        }
        let Some(parent) = self.forest.raw(id).cloned() else {
            return false;
        };
        if !self.forest.begin_load(id) {
            return false;
        }
        self.dispatch(
            LoadScope::Children(id.clone()),
            LoadAction::LoadChildrenOptions {
                parent_id: id.clone(),
                parent,
            },
        )
    }

    /// Requests the root options unless they are loaded or loading.
    pub fn load_root_options(&mut self) -> bool {
        if self.config.async_search {
            return false;
        }
        if self.loader.is_none() {
            report(&mut self.diagnostics, Diagnostic::OptionsWithoutLoader);
            return false;
        }
        if !self.root_load.begin() {
            return false;
        }
        self.dispatch(LoadScope::Root, LoadAction::LoadRootOptions)
    }

    /// Opens the menu, loading root options if they are unset.
    pub fn open_menu(&mut self) {
        if self.menu_open {
            return;
        }
        self.menu_open = true;
        self.events.push(Event::Open);
        if !self.config.async_search && !self.root_load.is_loaded() {
            self.load_root_options();
        }
    }

    /// Closes the menu.
    pub fn close_menu(&mut self) {
        if !self.menu_open {
            return;
        }
        self.menu_open = false;
        self.events.push(Event::Close);
    }

    /// Feeds typed search text at time `now_ms`.
    ///
    /// Non-empty text is applied once it has been stable for
    /// [`INPUT_DEBOUNCE_DELAY_MS`](crate::INPUT_DEBOUNCE_DELAY_MS); call
    /// [`tick`](Self::tick) to deliver it. Clearing the text applies at once.
    pub fn input_search(&mut self, query: impl Into<String>, now_ms: u64) {
        if !self.config.searchable {
            return;
        }
        let query = query.into();
        if query.is_empty() {
            self.set_search_query(query);
        } else {
            self.input.schedule(query, now_ms);
        }
    }

    /// Applies debounced search text that has become due. Returns `true` if
    /// a query was applied.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        match self.input.poll(now_ms) {
            Some(query) => {
                self.apply_search(query);
                true
            }
            None => false,
        }
    }

    /// Applies a search query immediately, dropping any pending input.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        if !self.config.searchable {
            return;
        }
        self.input.cancel();
        self.apply_search(query.into());
    }

    /// Completes a deferred load.
    ///
    /// Each ticket is honored once. A result for a branch that was removed
    /// or reloaded meanwhile is dropped; an async search result for a query
    /// that is no longer current is cached without being shown.
    pub fn resolve(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<N::Raw>, LoadError>,
    ) -> Result<(), ResolveError> {
        if ticket.instance() != self.id {
            return Err(ResolveError::WrongInstance(ticket.instance()));
        }
        let Some(scope) = self.pending.complete(ticket) else {
            tracing::trace!(instance = %self.id, serial = ticket.serial(), "ignoring repeated completion");
            return Err(ResolveError::UnknownTicket);
        };
        match (scope, result) {
            (LoadScope::Root, Ok(options)) => {
                if !self.root_load.is_loading() {
                    tracing::debug!(instance = %self.id, "dropping root options superseded by the host");
                    return Ok(());
                }
                tracing::debug!(instance = %self.id, count = options.len(), "root options loaded");
                self.root_load.succeed();
                if !self.config.async_search {
                    self.reconcile_by_value(|forest, keep| Some(forest.rebuild(options, keep)));
                }
            }
            (LoadScope::Root, Err(err)) => {
                if !self.root_load.is_loading() {
                    tracing::debug!(instance = %self.id, %err, "ignoring failure of superseded root options");
                    return Ok(());
                }
                tracing::debug!(instance = %self.id, %err, "root options failed");
                self.root_load.fail(err.message());
            }
            (LoadScope::Children(id), Ok(children)) => {
                let loading = self
                    .forest
                    .node(&id)
                    .and_then(Node::load_state)
                    .is_some_and(LoadState::is_loading);
                if !loading {
                    tracing::debug!(instance = %self.id, node = %id, "dropping children for a stale branch");
                    return Ok(());
                }
                self.reconcile_by_value(|forest, _| forest.merge_children(&id, children));
                if self.config.async_search {
                    let source = self.forest.source().to_vec();
                    if let Some(entry) = self.remote.get_mut(&self.search_query) {
                        entry.options = source;
                    }
                }
            }
            (LoadScope::Children(id), Err(err)) => {
                tracing::debug!(instance = %self.id, node = %id, %err, "children failed");
                self.forest.fail_load(&id, err.message());
            }
            (LoadScope::Search(query), result) => {
                let entry = self.remote.entry(query.clone()).or_default();
                let loaded = match result {
                    Ok(options) => {
                        entry.options = options;
                        entry.load.succeed();
                        true
                    }
                    Err(err) => {
                        entry.load.fail(err.message());
                        false
                    }
                };
                if loaded && self.config.async_search && query == self.search_query {
                    self.show_remote();
                } else {
                    tracing::debug!(instance = %self.id, query = query.as_str(), loaded, "search results not shown");
                }
            }
        }
        Ok(())
    }

    /// What a user action on `id` would do: `Some(true)` selects,
    /// `Some(false)` deselects, `None` means the node cannot be acted on.
    fn next_state(&self, id: &NodeId) -> Option<bool> {
        let node = self.forest.node(id)?;
        if node.is_disabled() || (self.config.disable_branch_nodes && node.is_branch()) {
            return None;
        }
        Some(if self.config.multiple && !self.config.flat {
            self.checked.get(id) == CheckedState::Unchecked
        } else {
            !self.selected.contains(id)
        })
    }

    fn apply(&mut self, id: &NodeId, next: bool) -> bool {
        if self.config.is_single() && next {
            self.selected.clear();
        }
        let Some(node) = self.forest.node(id) else {
            return false;
        };
        if next {
            select_node(&self.forest, &mut self.selected, &self.config, node);
        } else {
            deselect_node(&self.forest, &mut self.selected, &self.config, node);
        }
        let raw = self
            .forest
            .raw(id)
            .cloned()
            .unwrap_or_else(|| self.forest.normalizer().synthesize(id));
        self.events
            .push(if next { Event::Select(raw) } else { Event::Deselect(raw) });
        self.settle(BuildReport::default());

        if next && self.search.is_some() && (self.config.is_single() || self.config.clear_on_select) {
            self.set_search_query(String::new());
        }
        if self.config.is_single() && self.config.close_on_select {
            self.close_menu();
        }
        true
    }

    /// Reads a value into the selection, adding fallback nodes for unknown
    /// ids.
    fn decode_value(&mut self, value: Value<N::Raw>) {
        let mut items = read_value(self.forest.normalizer(), value, &mut self.diagnostics);
        if self.config.is_single() {
            items.truncate(1);
        }
        let ids: Vec<NodeId> = items.iter().map(|(id, _)| id.clone()).collect();
        for (id, raw) in items {
            self.forest.insert_fallback(id, raw);
        }
        let selection = selection_from_value(&self.forest, &self.config, &ids);
        self.selected.replace_with(selection);
    }

    /// Changes the tree while carrying the value across: the current value
    /// is decoded again against the changed tree.
    fn reconcile_by_value(
        &mut self,
        change: impl FnOnce(&mut Forest<N>, &[NodeId]) -> Option<BuildReport>,
    ) -> bool {
        let keep = self.selected.items().to_vec();
        let Some(report) = change(&mut self.forest, &keep) else {
            return false;
        };
        let value: Vec<NodeId> = self
            .internal_value
            .iter()
            .filter(|id| self.forest.contains(id))
            .cloned()
            .collect();
        let selection = selection_from_value(&self.forest, &self.config, &value);
        self.selected.replace_with(selection);
        self.settle(report);
        true
    }

    /// Brings all derived state up to date after the selection or the tree
    /// changed, then follows up on the build report.
    fn settle(&mut self, report: BuildReport) {
        if self.config.propagates() {
            complete_selection(&self.forest, &mut self.selected);
        }
        self.refresh_search();
        self.commit(true);
        self.absorb(report);
    }

    fn commit(&mut self, emit: bool) {
        self.checked = CheckedStates::build(&self.forest, &self.selected, &self.config);
        let next = internal_value(&self.forest, &self.selected, &self.config);
        if next != self.internal_value {
            self.internal_value = next;
            if emit {
                let value = self.value();
                self.events.push(Event::Input(value));
            }
        }
    }

    fn absorb(&mut self, report: BuildReport) {
        self.diagnostics
            .extend(report.diagnostics.into_iter().map(Diagnostic::from));
        for id in report.load_children {
            self.load_children(&id);
        }
    }

    fn refresh_search(&mut self) {
        let Some(previous) = self.search.take() else {
            return;
        };
        self.search = SearchOverlay::compute(
            &self.forest,
            &self.search_query,
            SearchOptions::from_config(&self.config),
        );
        if let Some(overlay) = self.search.as_mut() {
            overlay.inherit_expansion(&previous, &self.forest);
        }
    }

    fn apply_search(&mut self, query: String) {
        if query == self.search_query {
            return;
        }
        self.search_query = query.clone();
        self.events.push(Event::SearchChange(query));
        if self.config.async_search {
            self.handle_remote_search();
        } else {
            self.search = SearchOverlay::compute(
                &self.forest,
                &self.search_query,
                SearchOptions::from_config(&self.config),
            );
        }
    }

    /// Fetches the remote entry of `query`, applying the empty-query rules.
    fn remote_entry_mut(&mut self, query: &str) -> &mut RemoteEntry<N::Raw> {
        let entry = self.remote.entry(query.into()).or_default();
        if query.is_empty() {
            if let Some(options) = &self.default_options {
                entry.options = options.clone();
                entry.load.succeed();
            } else if !self.config.load_default_options {
                entry.load.succeed();
            }
        }
        entry
    }

    fn handle_remote_search(&mut self) {
        let query = self.search_query.clone();
        let entry = self.remote_entry_mut(&query);
        let (loaded, loading) = (entry.load.is_loaded(), entry.load.is_loading());
        if loaded && (query.is_empty() || self.config.cache_options) {
            self.show_remote();
            return;
        }
        if loading || self.loader.is_none() {
            return;
        }
        if let Some(entry) = self.remote.get_mut(&query) {
            entry.load = LoadState::Loading;
        }
        self.dispatch(
            LoadScope::Search(query.clone()),
            LoadAction::AsyncSearch { query },
        );
    }

    fn show_remote(&mut self) {
        let options = self
            .remote
            .get(&self.search_query)
            .map(|entry| entry.options.clone())
            .unwrap_or_default();
        self.reconcile_by_value(|forest, keep| Some(forest.rebuild(options, keep)));
    }

    /// Issues a request for `scope` and applies a synchronous answer.
    fn dispatch(&mut self, scope: LoadScope, action: LoadAction<N::Raw>) -> bool {
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        let Some(ticket) = self.pending.issue(self.id, scope) else {
            return false;
        };
        tracing::debug!(
            instance = %self.id,
            action = action.name(),
            serial = ticket.serial(),
            "requesting options"
        );
        if let LoadResponse::Ready(result) = loader.load(LoadRequest { ticket, action }) {
            if let Err(err) = self.resolve(ticket, result) {
                tracing::trace!(instance = %self.id, serial = ticket.serial(), %err, "synchronous answer not applied");
            }
        }
        true
    }
}
