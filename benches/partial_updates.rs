//! Benchmarks comparing in-place edits against full re-tessellation.
//!
//! - Fill color changes on one shape
//! - Translating one shape through the transform fast path
//! - Re-tessellating the whole tree

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera::{Color, DirtyReason, NoTextures, NodeId, Primitive, ShapeTree, Style, TessConfig, Transform};
use tessera_test_scenes::RecordingUploader;

fn build_tree(shape_count: usize) -> (ShapeTree, Vec<NodeId>) {
    let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
    let root = tree.root();
    let ids = (0..shape_count)
        .map(|i| {
            let x = (i % 32) as f32 * 20.0;
            let y = (i / 32) as f32 * 20.0;
            tree.create_primitive(
                root,
                Primitive::rounded_rect(x, y, 16.0, 16.0, 4.0),
                Style::default(),
            )
            .unwrap()
        })
        .collect();
    tree.update_tessellation(&NoTextures).unwrap();
    (tree, ids)
}

fn bench_fill_color(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_updates/fill_color");

    for shape_count in [100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(shape_count),
            &shape_count,
            |b, &count| {
                let (mut tree, ids) = build_tree(count);
                let mut uploader = RecordingUploader::default();
                tree.sync(&mut uploader);
                let mut toggle = false;

                b.iter(|| {
                    toggle = !toggle;
                    let color = if toggle { Color::BLACK } else { Color::WHITE };
                    tree.set_fill_color(ids[count / 2], color).unwrap();
                    black_box(tree.sync(&mut uploader));
                });
            },
        );
    }

    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_updates/translate");

    for shape_count in [100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(shape_count),
            &shape_count,
            |b, &count| {
                let (mut tree, ids) = build_tree(count);
                let mut uploader = RecordingUploader::default();
                tree.sync(&mut uploader);
                let step = Transform::translation(0.5, 0.0, 0.0);

                b.iter(|| {
                    tree.apply_transform(ids[count / 2], &step).unwrap();
                    black_box(tree.sync(&mut uploader));
                });
            },
        );
    }

    group.finish();
}

fn bench_full_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_updates/full_tessellation");

    for shape_count in [100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(shape_count),
            &shape_count,
            |b, &count| {
                let (mut tree, _) = build_tree(count);
                let root = tree.root();

                b.iter(|| {
                    tree.mark_dirty(root, DirtyReason::Structure).unwrap();
                    black_box(tree.update_tessellation(&NoTextures).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fill_color,
    bench_translate,
    bench_full_tessellation
);
criterion_main!(benches);
