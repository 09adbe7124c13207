use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livegrid::*;
use serde_json::{json, Value};

fn records(size: usize) -> Vec<Value> {
    (0..size)
        .map(|i| {
            json!({
                "name": format!("item-{:06}", (i * 7919) % size),
                "team": (["red", "green", "blue", "amber"][i % 4]),
                "size": (i * 31) % 1000,
                "children": [{"name": format!("child-{}", i), "team": "none", "size": i % 10}]
            })
        })
        .collect()
}

fn config(size: usize) -> GridConfig {
    let mut config = GridConfig::new(vec![
        ColumnDef::new("name"),
        ColumnDef::new("team"),
        ColumnDef::new("size").with_type(ColumnType::Number),
    ]);
    config.rows = records(size);
    config.refresh_debounce_ms = 0;
    config
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| Grid::new(black_box(config(size))).unwrap());
        });
    }
    group.finish();
}

fn bench_filter_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_full_scan");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = Grid::new(config(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                grid.set_filter(black_box(if flip { "item-00" } else { "red" }), false)
            });
        });
    }
    group.finish();
}

fn bench_filter_refinement(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_refinement");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = Grid::new(config(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                grid.set_filter("item-0", false);
                grid.set_filter(black_box("item-00"), false)
            });
        });
    }
    group.finish();
}

fn bench_sort_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_rebuild");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = Grid::new(config(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| grid.sort_column(black_box("size"), false, None).unwrap());
        });
    }
    group.finish();
}

fn bench_group_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_rebuild");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = Grid::new(config(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut add = false;
            b.iter(|| {
                add = !add;
                grid.group_column(black_box("team"), add).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_scroll_reposition(c: &mut Criterion) {
    let mut group = c.benchmark_group("scroll_reposition");

    for size in [1_000, 100_000, 1_000_000].iter() {
        let mut window = ViewportWindow::new(28.0, 600.0, None);
        window.set_visible_rows((0..*size).collect());
        window.calculate_row_position(true);
        let max = window.max_scroll_top();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut top = 0.0;
            b.iter(|| {
                top = (top + 997.0) % max;
                window.rearrange_list_nodes(black_box(top))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ingest,
    bench_filter_full_scan,
    bench_filter_refinement,
    bench_sort_rebuild,
    bench_group_rebuild,
    bench_scroll_reposition
);
criterion_main!(benches);
