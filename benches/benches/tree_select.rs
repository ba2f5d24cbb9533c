// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value as Json, json};
use understory_forest::{JsonNormalizer, NodeId};
use understory_tree_select::{
    SearchOptions, SearchOverlay, TreeSelect, TreeSelectConfig, Value, ValueConsistsOf,
};

fn options(width: usize) -> Vec<Json> {
    (0..width)
        .map(|i| {
            let children: Vec<Json> = (0..width)
                .map(|j| {
                    let leaves: Vec<Json> = (0..width)
                        .map(|k| json!({ "id": format!("{i}-{j}-{k}"), "label": format!("Item {i} {j} {k}") }))
                        .collect();
                    json!({ "id": format!("{i}-{j}"), "label": format!("Group {i} {j}"), "children": leaves })
                })
                .collect();
            json!({ "id": format!("{i}"), "label": format!("Section {i}"), "children": children })
        })
        .collect()
}

fn instance(width: usize, policy: ValueConsistsOf) -> TreeSelect<JsonNormalizer> {
    TreeSelect::builder(JsonNormalizer::new())
        .config(TreeSelectConfig {
            multiple: true,
            value_consists_of: policy,
            ..TreeSelectConfig::default()
        })
        .options(options(width))
        .build()
}

fn bench_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_select/toggle");
    for width in [8usize, 16, 24] {
        let root = NodeId::from("0");
        group.bench_with_input(BenchmarkId::new("root_branch", width), &width, |b, &width| {
            b.iter_batched(
                || instance(width, ValueConsistsOf::BranchPriority),
                |mut select| {
                    select.toggle(&root);
                    black_box(select.internal_value().len());
                },
                BatchSize::LargeInput,
            );
        });

        let leaf = NodeId::from("0-0-0");
        group.bench_with_input(BenchmarkId::new("leaf", width), &width, |b, &width| {
            b.iter_batched(
                || instance(width, ValueConsistsOf::LeafPriority),
                |mut select| {
                    select.toggle(&leaf);
                    black_box(select.checked_states());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_select/search");
    for width in [8usize, 16, 24] {
        let select = instance(width, ValueConsistsOf::BranchPriority);
        for (name, options) in [
            ("fuzzy", SearchOptions::default()),
            (
                "substring",
                SearchOptions {
                    disable_fuzzy_matching: true,
                    ..SearchOptions::default()
                },
            ),
        ] {
            group.bench_with_input(BenchmarkId::new(name, width), &select, |b, select| {
                b.iter(|| black_box(SearchOverlay::compute(select.forest(), "item 1 2", options)));
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_select/set_value");
    for width in [8usize, 16, 24] {
        let leaves: Vec<NodeId> = (0..width)
            .flat_map(|i| (0..width).map(move |j| NodeId::from(format!("{i}-{j}-0"))))
            .collect();
        group.bench_with_input(BenchmarkId::new("leaf_priority", width), &leaves, |b, leaves| {
            b.iter_batched(
                || (instance(width, ValueConsistsOf::LeafPriority), leaves.clone()),
                |(mut select, leaves)| {
                    select.set_value(Value::Ids(leaves));
                    black_box(select.internal_value().len());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_toggle, bench_search, bench_decode);
criterion_main!(benches);
