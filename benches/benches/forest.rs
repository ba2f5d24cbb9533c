// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use serde_json::{Value, json};
use understory_forest::{BuildOptions, Forest, JsonNormalizer, NodeId};

/// `width` roots, each with `width` children holding `width` leaves.
fn options(width: usize) -> Vec<Value> {
    (0..width)
        .map(|i| {
            let children: Vec<Value> = (0..width)
                .map(|j| {
                    let leaves: Vec<Value> = (0..width)
                        .map(|k| json!({ "id": format!("{i}-{j}-{k}"), "label": format!("Leaf {k}") }))
                        .collect();
                    json!({ "id": format!("{i}-{j}"), "label": format!("Group {j}"), "children": leaves })
                })
                .collect();
            json!({ "id": format!("{i}"), "label": format!("Root {i}"), "children": children })
        })
        .collect()
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest/rebuild");
    for width in [8usize, 16, 32] {
        let source = options(width);
        group.throughput(Throughput::Elements((width + width * width + width.pow(3)) as u64));
        group.bench_with_input(BenchmarkId::new("fresh", width), &source, |b, source| {
            b.iter_batched(
                || source.clone(),
                |source| {
                    let mut forest = Forest::new(JsonNormalizer::new(), BuildOptions::default());
                    black_box(forest.rebuild(source, &[]));
                    black_box(forest);
                },
                BatchSize::LargeInput,
            );
        });

        // Carrying state over from a previous build, with a selection to keep.
        let keep: Vec<NodeId> = (0..width).map(|i| NodeId::from(format!("{i}-0-0"))).collect();
        group.bench_with_input(BenchmarkId::new("carry_over", width), &source, |b, source| {
            b.iter_batched(
                || {
                    let mut forest = Forest::new(JsonNormalizer::new(), BuildOptions::default());
                    let _ = forest.rebuild(source.clone(), &[]);
                    (forest, source.clone())
                },
                |(mut forest, source)| {
                    black_box(forest.rebuild(source, &keep));
                    black_box(forest);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_merge_children(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest/merge_children");
    for width in [64usize, 256, 1_024] {
        let children: Vec<Value> = (0..width)
            .map(|k| json!({ "id": format!("child-{k}") }))
            .collect();
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &children, |b, children| {
            b.iter_batched(
                || {
                    let options = BuildOptions {
                        can_load_children: true,
                        ..BuildOptions::default()
                    };
                    let mut forest = Forest::new(JsonNormalizer::new(), options);
                    let _ = forest.rebuild(vec![json!({ "id": "lazy", "children": null })], &[]);
                    (forest, children.clone())
                },
                |(mut forest, children)| {
                    black_box(forest.merge_children(&NodeId::from("lazy"), children));
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rebuild, bench_merge_children);
criterion_main!(benches);
