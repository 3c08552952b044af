//! Loader Benchmarks
//!
//! ## Groups
//!
//! - `index/*`: flags-only scan building the bookmark index
//! - `materialize/*`: seek to one frame, decode and group it
//! - `grouping/*`: grouping an already decoded frame
//! - `search/*`: substring search across frames, hit in the last frame
//!
//! All sources are in memory, so these measure decoding and grouping cost
//! rather than disk reads.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench loader
//! cargo bench --bench loader -- "index"  # specific group
//! ```

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use std::time::Duration;
use tracedex::engine::{
    build_index, group_calls, materialize_frame, CancelToken, DefaultCallFilter, EventSink,
    MaterializeContext, ProgressReporter, SearchRequest, SignatureCache,
};
use tracedex::model::{CallFlags, RawCall, Value};
use tracedex::storage::{CallScript, MemorySource};
use tracedex::Trace;

// =============================================================================
// Fixtures - built once, outside timed loops
// =============================================================================

/// `frames` frames of nested debug groups around draws.
fn script(frames: usize) -> CallScript {
    let mut s = CallScript::new();
    for frame in 0..frames {
        for pass in 0..4 {
            s.push_group(&format!("pass {}", pass));
            for draw in 0..5 {
                s.call(
                    "glBindTexture",
                    &[
                        ("target", Value::UInt(3553)),
                        ("texture", Value::UInt((frame * 100 + draw) as u64)),
                    ],
                    CallFlags::NONE,
                );
                s.ordinary("glUniform4fv");
                s.render("glDrawElements");
            }
            s.pop_group();
        }
        s.ordinary("glGetError");
        s.swap();
    }
    s
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");
    for frames in [100usize, 1_000] {
        let calls = script(frames).into_calls();
        group.throughput(Throughput::Elements(calls.len() as u64));
        group.bench_with_input(BenchmarkId::new("frames", frames), &calls, |b, calls| {
            b.iter_batched(
                || MemorySource::new(calls.clone()),
                |mut source| {
                    let sink = EventSink::new();
                    let mut progress = ProgressReporter::new(&sink, 1);
                    black_box(build_index(&mut source, &CancelToken::new(), &mut progress).unwrap())
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let calls = script(200).into_calls();
    let mut source = MemorySource::new(calls);
    let sink = EventSink::new();
    let mut progress = ProgressReporter::new(&sink, 1);
    let scan = build_index(&mut source, &CancelToken::new(), &mut progress).unwrap();
    let entry = *scan.index.entry(100).unwrap();
    let sigs = SignatureCache::new();
    let filter = DefaultCallFilter::default();
    let cancel = CancelToken::new();

    group.throughput(Throughput::Elements(entry.num_calls));
    group.bench_function("middle_frame", |b| {
        b.iter(|| {
            let ctx = MaterializeContext {
                sigs: &sigs,
                filter: &filter,
                cancel: &cancel,
            };
            black_box(materialize_frame(&mut source, 100, &entry, ctx).unwrap())
        });
    });
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouping");
    let frame: Vec<RawCall> = script(1).into_calls();
    let sigs = SignatureCache::new();
    let filter = DefaultCallFilter::default();

    group.throughput(Throughput::Elements(frame.len() as u64));
    group.bench_function("one_frame", |b| {
        b.iter_batched(
            || frame.clone(),
            |calls| black_box(group_calls(calls, &sigs, &filter)),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let frames = 500;
    let calls = script(frames).into_calls();
    // Only the last frame binds this texture.
    let needle = format!("texture={}", (frames - 1) * 100 + 4);

    group.bench_function("forward_to_last_frame", |b| {
        b.iter_batched(
            || Trace::from_source(MemorySource::new(calls.clone())).unwrap(),
            |trace| {
                let result = trace.search(SearchRequest::forward(0, needle.as_str())).unwrap();
                black_box(result.is_found())
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(
    name = loading;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(20);
    targets = bench_index, bench_materialize
);

criterion_group!(
    name = browsing;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(20);
    targets = bench_grouping, bench_search
);

criterion_main!(loading, browsing);
