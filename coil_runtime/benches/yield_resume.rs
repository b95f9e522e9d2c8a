//! Yield/Resume Benchmarks
//!
//! Measures the cost of a full suspend/resume round trip through the
//! invoke protocol, instance binding from a shared program, and the
//! bounded-collect driver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use coil_runtime::{collect, gen, generator, BinOp, Body, Expr, Iterate, Stmt};

fn counter_body() -> Body {
    Body::new("counter")
        .stmt(Stmt::assign("i", Expr::constant(0i64)))
        .stmt(Stmt::While {
            cond: Expr::constant(true),
            body: vec![
                Stmt::yield_value(Expr::local("i")),
                Stmt::assign(
                    "i",
                    Expr::binary(BinOp::Add, Expr::local("i"), Expr::constant(1i64)),
                ),
            ],
        })
}

// =============================================================================
// Suspend/Resume Round Trips
// =============================================================================

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");

    group.bench_function("single_round_trip", |b| {
        let mut g = gen(&counter_body()).unwrap();
        b.iter(|| black_box(g.invoke().unwrap()))
    });

    group.bench_function("exhausted_sentinel", |b| {
        let body = Body::new("once").stmt(Stmt::yield_value(Expr::constant(0i64)));
        let mut g = gen(&body).unwrap();
        let _ = g.invoke();
        let _ = g.invoke();
        b.iter(|| black_box(g.invoke().unwrap()))
    });

    group.finish();
}

// =============================================================================
// Binding and Collection
// =============================================================================

fn bench_factory_bind(c: &mut Criterion) {
    let factory = generator(&counter_body()).unwrap();
    c.bench_function("factory_bind", |b| {
        b.iter(|| black_box(factory.call(&[]).unwrap()))
    });
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect");
    for cap in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(cap), &cap, |b, &cap| {
            let factory = generator(&counter_body()).unwrap();
            b.iter(|| {
                let mut g = factory.call(&[]).unwrap();
                black_box(collect(&mut g, Some(cap)).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_counter", |b| {
        let body = counter_body();
        b.iter(|| black_box(coil_runtime::compile_generator(&body).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_invoke,
    bench_factory_bind,
    bench_collect,
    bench_compile
);
criterion_main!(benches);
