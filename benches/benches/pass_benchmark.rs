//! Codec and aggregation benchmarks.
//!
//! Run with: `cargo bench --package odfce-bench`

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use odfce_bench::{GROUP, TRADING_START, now, odf_name, prepared_store, synthetic_store};
use odfce_lib::{
    BlobLayout, BlobStore, Epoch, FsBlobStore, IntervalTable, OdfExtension, PassContext,
    Processor, RecordStore, Settings, ZeroChunks, run_pass,
};
use tempfile::TempDir;

fn decode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for days in [1, 5] {
        let store = synthetic_store(days);
        let bytes = store.encode().expect("encode fixture");
        let text = store.to_text();
        group.throughput(Throughput::Elements(store.len() as u64));

        group.bench_with_input(BenchmarkId::new("binary", days), &bytes, |b, bytes| {
            b.iter(|| RecordStore::load(&mut bytes.as_slice()).expect("decode"));
        });
        group.bench_with_input(BenchmarkId::new("text", days), &text, |b, text| {
            b.iter(|| RecordStore::load_text(text.as_bytes()).expect("parse"));
        });
    }

    group.finish();
}

fn pass_benchmark(c: &mut Criterion) {
    let settings = Settings::default();
    let name = odf_name();
    let mut group = c.benchmark_group("pass");
    group.sample_size(10);

    for days in [1, 5] {
        let store = prepared_store(days);
        let intervals = IntervalTable::standard(TRADING_START, &settings.intervals);
        let ctx = PassContext {
            name: &name,
            current_epoch: Epoch::current(now()),
            settings: &settings,
            intervals: &intervals,
        };
        group.throughput(Throughput::Elements(store.len() as u64));

        group.bench_with_input(BenchmarkId::new("in_memory", days), &store, |b, store| {
            b.iter_batched(
                || store.clone(),
                |mut store| run_pass(&mut store, &ctx, &mut ZeroChunks).expect("pass"),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn processor_benchmark(c: &mut Criterion) {
    let settings = Settings::default();
    let name = odf_name();
    let bytes = synthetic_store(1).encode().expect("encode fixture");
    let path = BlobLayout::new(GROUP).odf(&name, OdfExtension::Binary);

    let mut group = c.benchmark_group("processor");
    group.sample_size(10);

    group.bench_function("first_pass_1_day", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().expect("temp dir");
                let store = FsBlobStore::new(dir.path().to_path_buf()).expect("store");
                store.write(&path, &bytes).expect("seed ODF");
                (dir, store)
            },
            |(_dir, store)| {
                let processor =
                    Processor::new(&store, &store, &settings, now()).expect("processor");
                processor.process(GROUP, &name).expect("pass")
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

criterion_group!(benches, decode_benchmark, pass_benchmark, processor_benchmark);
criterion_main!(benches);
