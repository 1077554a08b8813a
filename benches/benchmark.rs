//! Benchmarks for the sandbox, the wire codec and session edits.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pairpad::{ChannelEvent, Language, OriginId, Sandbox, SessionState};

fn bench_execute_hello(c: &mut Criterion) {
    c.bench_function("execute_hello", |b| {
        let mut sandbox = Sandbox::default();
        b.iter(|| black_box(sandbox.execute("console.log('hello', 1 + 2)", Language::JavaScript)))
    });
}

fn bench_execute_fib(c: &mut Criterion) {
    let source = "
        function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
        console.log(fib(15));
    ";
    c.bench_function("execute_fib_15", |b| {
        let mut sandbox = Sandbox::default();
        b.iter(|| black_box(sandbox.execute(source, Language::JavaScript)))
    });
}

fn bench_execute_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_output");

    for lines in [10, 100, 1000].iter() {
        let source = format!("for (let i = 0; i < {lines}; i++) {{ console.log('line', i); }}");
        group.bench_with_input(BenchmarkId::new("lines", lines), lines, |b, _| {
            let mut sandbox = Sandbox::default();
            b.iter(|| black_box(sandbox.execute(&source, Language::JavaScript)))
        });
    }
    group.finish();
}

fn bench_execute_unsupported(c: &mut Criterion) {
    c.bench_function("execute_unsupported", |b| {
        let mut sandbox = Sandbox::default();
        b.iter(|| black_box(sandbox.execute("print('hi')", Language::Python)))
    });
}

fn bench_event_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_codec");

    for size in [64, 4 * 1024, 256 * 1024].iter() {
        let content = "x = 1;\n".repeat(size / 7 + 1);
        let event = ChannelEvent::document_changed(content, OriginId::generate());
        let frame = event.encode().unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), size, |b, _| {
            b.iter(|| black_box(event.encode().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), size, |b, _| {
            b.iter(|| black_box(ChannelEvent::decode(&frame).unwrap()))
        });
    }
    group.finish();
}

fn bench_local_edit(c: &mut Criterion) {
    c.bench_function("local_edit", |b| {
        let mut session = SessionState::new(OriginId::generate());
        let mut i = 0u64;
        b.iter(|| {
            black_box(session.apply_local_edit(format!("console.log({})", i)));
            i += 1;
        })
    });
}

fn bench_apply_remote(c: &mut Criterion) {
    c.bench_function("apply_remote", |b| {
        let mut session = SessionState::new(OriginId::new("local"));
        let event = ChannelEvent::document_changed("let shared = true;", OriginId::new("peer"));
        b.iter(|| black_box(session.apply_remote(&event)))
    });
}

fn bench_snapshot(c: &mut Criterion) {
    c.bench_function("snapshot", |b| {
        let mut session = SessionState::new(OriginId::generate());
        session.apply_local_edit("function f() { return 42; }\n".repeat(50));
        b.iter(|| {
            black_box(session.take_snapshot().sequence());
        })
    });
}

criterion_group!(
    benches,
    bench_execute_hello,
    bench_execute_fib,
    bench_execute_output,
    bench_execute_unsupported,
    bench_event_codec,
    bench_local_edit,
    bench_apply_remote,
    bench_snapshot,
);

criterion_main!(benches);
