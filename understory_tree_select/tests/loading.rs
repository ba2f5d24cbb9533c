// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy loading of root options, branch children and async search results.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value as Json, json};
use understory_tree_select::understory_forest::{JsonNormalizer, LoadState, NodeId};
use understory_tree_select::{
    CheckedState, Diagnostic, Event, InstanceRouter, LoadAction, LoadError, LoadRequest,
    LoadResponse, LoadTicket, ResolveError, RouteError, TreeSelect, TreeSelectConfig, Value,
    ValueConsistsOf,
};

type Requests = Rc<RefCell<Vec<LoadRequest<Json>>>>;

/// A loader that records every request and answers later.
fn recording() -> (
    Requests,
    impl FnMut(LoadRequest<Json>) -> LoadResponse<Json> + 'static,
) {
    let requests = Requests::default();
    let log = Rc::clone(&requests);
    let loader = move |request: LoadRequest<Json>| -> LoadResponse<Json> {
        log.borrow_mut().push(request);
        LoadResponse::Pending
    };
    (requests, loader)
}

fn ticket(requests: &Requests, index: usize) -> LoadTicket {
    requests.borrow()[index].ticket
}

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn options(source: Json) -> Vec<Json> {
    let Json::Array(items) = source else {
        panic!("options must be an array");
    };
    items
}

fn multi() -> TreeSelectConfig {
    TreeSelectConfig {
        multiple: true,
        ..TreeSelectConfig::default()
    }
}

fn lazy_branch(config: TreeSelectConfig, value: Value<Json>) -> (Requests, TreeSelect<JsonNormalizer>) {
    let (requests, loader) = recording();
    let select = TreeSelect::builder(JsonNormalizer::new())
        .config(config)
        .options(options(json!([{ "id": "a", "children": null }, { "id": "b" }])))
        .value(value)
        .loader(loader)
        .build();
    (requests, select)
}

#[test]
fn unset_root_options_load_once() {
    let (requests, loader) = recording();
    let mut select = TreeSelect::builder(JsonNormalizer::new())
        .config(multi())
        .loader(loader)
        .build();
    assert_eq!(requests.borrow().len(), 1);
    assert_eq!(requests.borrow()[0].action, LoadAction::LoadRootOptions);
    assert_eq!(select.root_load_state(), &LoadState::Loading);
    assert!(select.has_pending_loads());

    select.open_menu();
    assert!(!select.load_root_options());
    assert_eq!(requests.borrow().len(), 1);

    let first = ticket(&requests, 0);
    select
        .resolve(first, Ok(options(json!([{ "id": "a", "children": null }, { "id": "b" }]))))
        .unwrap();
    assert_eq!(select.root_load_state(), &LoadState::Loaded);
    assert_eq!(select.forest().root_ids(), &[id("a"), id("b")]);
    assert!(!select.has_pending_loads());

    assert_eq!(
        select.resolve(first, Ok(Vec::new())),
        Err(ResolveError::UnknownTicket)
    );
    assert_eq!(select.forest().len(), 2);
}

#[test]
fn root_options_can_wait_for_the_menu() {
    let (requests, loader) = recording();
    let mut select = TreeSelect::builder(JsonNormalizer::new())
        .config(TreeSelectConfig {
            auto_load_root_options: false,
            ..TreeSelectConfig::default()
        })
        .loader(loader)
        .build();
    assert!(requests.borrow().is_empty());
    assert_eq!(select.root_load_state(), &LoadState::Unloaded);

    select.open_menu();
    assert_eq!(requests.borrow().len(), 1);
    assert_eq!(select.drain_events(), vec![Event::Open]);
}

#[test]
fn unset_options_without_a_loader_are_reported() {
    let mut select = TreeSelect::builder(JsonNormalizer::new()).build();
    assert_eq!(select.drain_diagnostics(), vec![Diagnostic::OptionsWithoutLoader]);
    assert!(select.forest().is_empty());

    let (requests, loader) = recording();
    select.set_loader(Some(Box::new(loader)));
    select.open_menu();
    assert_eq!(requests.borrow().len(), 1);
}

#[test]
fn failed_root_options_retry_on_open() {
    let mut calls = 0;
    let mut select = TreeSelect::builder(JsonNormalizer::new())
        .loader(move |_: LoadRequest<Json>| {
            calls += 1;
            if calls == 1 {
                LoadResponse::Ready(Err(LoadError::new("offline")))
            } else {
                LoadResponse::Ready(Ok(vec![json!({ "id": "a" })]))
            }
        })
        .build();
    assert_eq!(
        select.root_load_state(),
        &LoadState::Failed("offline".into())
    );
    assert!(select.forest().is_empty());

    select.open_menu();
    assert_eq!(select.root_load_state(), &LoadState::Loaded);
    assert!(select.forest().contains(&id("a")));
}

#[test]
fn host_options_win_over_a_late_root_load() {
    let (requests, loader) = recording();
    let mut select = TreeSelect::builder(JsonNormalizer::new())
        .loader(loader)
        .build();
    assert_eq!(requests.borrow().len(), 1);

    select.set_options(Some(options(json!([{ "id": "host" }]))));
    assert_eq!(select.root_load_state(), &LoadState::Loaded);

    select
        .resolve(ticket(&requests, 0), Ok(options(json!([{ "id": "late" }]))))
        .unwrap();
    assert_eq!(select.forest().root_ids(), &[id("host")]);
    assert!(!select.forest().contains(&id("late")));
    assert_eq!(select.root_load_state(), &LoadState::Loaded);
    assert!(!select.has_pending_loads());
}

#[test]
fn expanding_a_loading_branch_does_not_reload() {
    let (requests, mut select) = lazy_branch(multi(), Value::Ids(Vec::new()));
    assert!(requests.borrow().is_empty());

    assert!(select.toggle_expanded(&id("a")));
    assert_eq!(
        requests.borrow()[0].action,
        LoadAction::LoadChildrenOptions {
            parent_id: id("a"),
            parent: json!({ "id": "a", "children": null }),
        }
    );
    assert!(!select.toggle_expanded(&id("a")));
    assert!(select.toggle_expanded(&id("a")));
    assert!(!select.load_children(&id("a")));
    assert_eq!(requests.borrow().len(), 1);

    let node = select.forest().node(&id("a")).unwrap();
    assert_eq!(node.load_state(), Some(&LoadState::Loading));
}

#[test]
fn failed_children_can_be_retried() {
    let (requests, mut select) = lazy_branch(multi(), Value::Ids(Vec::new()));
    select.toggle_expanded(&id("a"));
    select
        .resolve(ticket(&requests, 0), Err(LoadError::new("boom")))
        .unwrap();
    let node = select.forest().node(&id("a")).unwrap();
    assert_eq!(node.load_state(), Some(&LoadState::Failed("boom".into())));
    assert_eq!(node.load_state().and_then(LoadState::error), Some("boom"));

    assert!(select.load_children(&id("a")));
    select
        .resolve(ticket(&requests, 1), Ok(options(json!([{ "id": "aa" }]))))
        .unwrap();
    assert!(select.forest().node(&id("a")).unwrap().is_loaded());
    assert_eq!(select.forest().node(&id("aa")).unwrap().level(), 1);
}

#[test]
fn loaded_children_of_a_checked_branch_are_checked() {
    let (requests, mut select) = lazy_branch(multi(), Value::Ids(vec![id("a")]));
    assert_eq!(select.checked_state(&id("a")), CheckedState::Checked);

    select.toggle_expanded(&id("a"));
    select
        .resolve(
            ticket(&requests, 0),
            Ok(options(json!([{ "id": "x" }, { "id": "y" }]))),
        )
        .unwrap();
    assert_eq!(select.checked_state(&id("x")), CheckedState::Checked);
    assert_eq!(select.checked_state(&id("y")), CheckedState::Checked);
    assert_eq!(select.internal_value(), &[id("a")]);
    assert!(select.drain_events().is_empty());
}

#[test]
fn loaded_children_take_over_a_leaf_value() {
    let config = TreeSelectConfig {
        value_consists_of: ValueConsistsOf::LeafPriority,
        ..multi()
    };
    let (requests, mut select) = lazy_branch(config, Value::Ids(vec![id("a")]));
    assert_eq!(select.internal_value(), &[id("a")]);

    select.toggle_expanded(&id("a"));
    select
        .resolve(
            ticket(&requests, 0),
            Ok(options(json!([{ "id": "x" }, { "id": "y" }]))),
        )
        .unwrap();
    assert_eq!(select.internal_value(), &[id("x"), id("y")]);
    assert_eq!(
        select.drain_events(),
        vec![Event::Input(Value::Ids(vec![id("x"), id("y")]))]
    );
}

#[test]
fn children_for_a_replaced_branch_are_dropped() {
    let (requests, mut select) = lazy_branch(multi(), Value::Ids(Vec::new()));
    select.toggle_expanded(&id("a"));
    select.set_options(Some(options(json!([
        { "id": "a", "children": [{ "id": "z" }] },
        { "id": "b" },
    ]))));

    select
        .resolve(ticket(&requests, 0), Ok(options(json!([{ "id": "x" }]))))
        .unwrap();
    assert_eq!(select.forest().node(&id("a")).unwrap().children(), &[id("z")]);
    assert!(!select.forest().contains(&id("x")));
    assert!(!select.has_pending_loads());
}

#[test]
fn tickets_belong_to_their_instance() {
    let (requests, mut first) = lazy_branch(multi(), Value::Ids(Vec::new()));
    let (_, mut second) = lazy_branch(multi(), Value::Ids(Vec::new()));
    first.toggle_expanded(&id("a"));
    let issued = ticket(&requests, 0);
    assert_eq!(issued.instance(), first.id());

    assert_eq!(
        second.resolve(issued, Ok(Vec::new())),
        Err(ResolveError::WrongInstance(first.id()))
    );
    assert_eq!(first.resolve(issued, Ok(Vec::new())), Ok(()));
}

#[test]
fn router_delivers_completions() {
    let (requests, select) = lazy_branch(multi(), Value::Ids(Vec::new()));
    let shared = Rc::new(RefCell::new(select));
    let mut router = InstanceRouter::new();
    let instance = router.register(&shared);
    assert_eq!(router.len(), 1);

    shared.borrow_mut().toggle_expanded(&id("a"));
    let issued = ticket(&requests, 0);

    {
        let _held = shared.borrow();
        assert_eq!(
            router.route(issued, Ok(Vec::new())),
            Err(RouteError::Busy(instance))
        );
    }
    router
        .route(issued, Ok(options(json!([{ "id": "aa" }]))))
        .unwrap();
    assert!(shared.borrow().forest().contains(&id("aa")));
    assert_eq!(
        router.route(issued, Ok(Vec::new())),
        Err(RouteError::Resolve(ResolveError::UnknownTicket))
    );

    drop(shared);
    assert_eq!(
        router.route(issued, Ok(Vec::new())),
        Err(RouteError::UnknownInstance(instance))
    );
    router.prune();
    assert!(router.is_empty());
}

fn async_select(config: TreeSelectConfig) -> (Requests, TreeSelect<JsonNormalizer>) {
    let (requests, loader) = recording();
    let select = TreeSelect::builder(JsonNormalizer::new())
        .config(TreeSelectConfig {
            async_search: true,
            ..config
        })
        .loader(loader)
        .build();
    (requests, select)
}

fn search_ticket(requests: &Requests, query: &str) -> LoadTicket {
    requests
        .borrow()
        .iter()
        .find(|request| {
            matches!(&request.action, LoadAction::AsyncSearch { query: q } if q == query)
        })
        .map(|request| request.ticket)
        .unwrap()
}

#[test]
fn async_search_shows_only_the_current_query() {
    let (requests, mut select) = async_select(multi());
    assert!(requests.borrow().is_empty());
    assert!(select.forest().is_empty());

    select.input_search("ap", 0);
    select.tick(200);
    select.input_search("app", 250);
    select.tick(450);
    assert_eq!(requests.borrow().len(), 2);

    select
        .resolve(search_ticket(&requests, "ap"), Ok(options(json!([{ "id": "apple" }]))))
        .unwrap();
    assert!(select.forest().is_empty());
    let entry = select.remote_entry("ap").unwrap();
    assert!(entry.load_state().is_loaded());
    assert_eq!(entry.options(), &[json!({ "id": "apple" })]);

    select
        .resolve(
            search_ticket(&requests, "app"),
            Ok(options(json!([{ "id": "apple" }, { "id": "applesauce" }]))),
        )
        .unwrap();
    assert_eq!(select.forest().root_ids(), &[id("apple"), id("applesauce")]);

    // Cached queries are shown without another request.
    select.set_search_query("ap");
    assert_eq!(select.forest().root_ids(), &[id("apple")]);
    assert_eq!(requests.borrow().len(), 2);
}

#[test]
fn async_search_without_cache_refetches() {
    let (requests, mut select) = async_select(TreeSelectConfig {
        cache_options: false,
        ..multi()
    });
    select.set_search_query("ap");
    select
        .resolve(search_ticket(&requests, "ap"), Ok(Vec::new()))
        .unwrap();
    select.set_search_query("");
    select.set_search_query("ap");
    assert_eq!(requests.borrow().len(), 2);
}

#[test]
fn async_selection_survives_query_changes() {
    let (requests, mut select) = async_select(multi());
    select.set_search_query("app");
    select
        .resolve(search_ticket(&requests, "app"), Ok(options(json!([{ "id": "apple" }]))))
        .unwrap();
    select.toggle(&id("apple"));

    select.set_search_query("");
    assert!(select.forest().root_ids().is_empty());
    assert!(select.forest().node(&id("apple")).unwrap().is_fallback());
    assert_eq!(select.value(), Value::Ids(vec![id("apple")]));
}

#[test]
fn default_options_for_the_empty_query() {
    let (requests, loader) = recording();
    let select = TreeSelect::builder(JsonNormalizer::new())
        .config(TreeSelectConfig {
            async_search: true,
            ..TreeSelectConfig::default()
        })
        .default_options(options(json!([{ "id": "x" }])))
        .loader(loader)
        .build();
    assert_eq!(select.forest().root_ids(), &[id("x")]);
    assert!(requests.borrow().is_empty());

    let (requests, mut select) = async_select(TreeSelectConfig {
        load_default_options: true,
        ..TreeSelectConfig::default()
    });
    assert_eq!(
        requests.borrow()[0].action,
        LoadAction::AsyncSearch {
            query: String::new()
        }
    );
    select
        .resolve(ticket(&requests, 0), Ok(options(json!([{ "id": "y" }]))))
        .unwrap();
    assert_eq!(select.forest().root_ids(), &[id("y")]);
}

#[test]
fn async_mode_ignores_root_options() {
    let (requests, mut select) = async_select(TreeSelectConfig::default());
    select.set_options(Some(options(json!([{ "id": "a" }]))));
    assert!(select.forest().is_empty());
    select.open_menu();
    assert!(requests.borrow().is_empty());
}
