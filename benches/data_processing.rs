//! Benchmarks for chart projection and test-file parsing
//!
//! Run with: cargo bench

use cmeasure_rs::analysis::{depth_labels, ChartProjector};
use cmeasure_rs::config::ChartLayout;
use cmeasure_rs::session::csv_series;
use cmeasure_rs::session::SeriesStore;
use cmeasure_rs::types::Measurement;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn profile(len: usize, phase: f64) -> Vec<f64> {
    (0..len)
        .map(|i| 10.0 + 5.0 * ((i as f64) * 0.3 + phase).sin())
        .collect()
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("chart_projection");
    let projector = ChartProjector::new("bench-plot", ChartLayout::default());

    for cells in [8, 64, 512].iter() {
        let series = vec![profile(*cells, 0.0), profile(*cells, 1.0)];
        let labels = depth_labels(*cells, 15);
        group.throughput(Throughput::Elements((*cells * 2) as u64));

        group.bench_with_input(BenchmarkId::new("computed_ceiling", cells), cells, |b, _| {
            b.iter(|| projector.project(black_box(&series), &labels, None));
        });
        group.bench_with_input(BenchmarkId::new("fixed_ceiling", cells), cells, |b, _| {
            b.iter(|| projector.project(black_box(&series), &labels, Some(12.0)));
        });
    }

    group.finish();
}

fn bench_csv_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_parse");

    for rows in [8, 1_000, 100_000].iter() {
        let text = csv_series::render(&profile(*rows, 0.5));
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", rows), &text, |b, text| {
            b.iter(|| csv_series::parse(black_box(text)));
        });
    }

    // Noisy files with skipped rows and CRLF endings
    let noisy: String = std::iter::once("Cell,Value\r\n".to_string())
        .chain((0..10_000).map(|i| {
            if i % 7 == 0 {
                format!("{},n/a\r\n", i + 1)
            } else {
                format!("{},{}\r\n", i + 1, i as f64 * 0.25)
            }
        }))
        .collect();
    group.bench_function("parse_noisy_10k", |b| {
        b.iter(|| csv_series::parse(black_box(&noisy)));
    });

    group.finish();
}

fn bench_measurement_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("measurement_table");

    for cells in [8, 64].iter() {
        let mut store = SeriesStore::new();
        store.set_measurements(
            profile(*cells, 0.0)
                .into_iter()
                .enumerate()
                .map(|(i, v)| Measurement::new(i, v).with_raw(1000.0 + v))
                .collect(),
        );
        store.freeze();
        group.bench_with_input(BenchmarkId::new("rows", cells), cells, |b, _| {
            b.iter(|| black_box(&store).measurement_rows());
        });
        group.bench_with_input(BenchmarkId::new("chart_series", cells), cells, |b, _| {
            b.iter(|| black_box(&store).measurement_chart());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_projection,
    bench_csv_parse,
    bench_measurement_rows
);
criterion_main!(benches);
