use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lotvm::prelude::*;

/// S -> a | (S S)
fn pairs() -> Grammar {
    let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str]).expect("valid types");
    g.add_terminal("a", "a", 1.0).expect("a");
    g.add_primitive(
        ValueType::Str,
        "(%s%s)",
        &[ValueType::Str, ValueType::Str],
        1.0,
        |args| Ok(args[0].clone()),
    )
    .expect("pair");
    g
}

fn bench_expand(c: &mut Criterion) {
    let g = pairs();
    let mut group = c.benchmark_group("expand_from_integer");

    for z in [10u64, 1_000, 1_000_000, 1 << 40].iter() {
        group.bench_with_input(BenchmarkId::new("pairs", z), z, |b, &z| {
            b.iter(|| black_box(g.expand_from_integer(0, black_box(z)).expect("expands")));
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let g = pairs();
    let trees: Vec<Node> = (0..1000u64)
        .map(|z| g.expand_from_integer(0, z).expect("expands"))
        .collect();

    c.bench_function("compute_enumeration_order_1000", |b| {
        b.iter(|| {
            for t in &trees {
                black_box(g.compute_enumeration_order(t).expect("has a code"));
            }
        });
    });

    c.bench_function("enumerate_first_1000", |b| {
        b.iter(|| g.enumerate(0).take(1000).filter_map(Result::ok).count());
    });
}

criterion_group!(benches, bench_expand, bench_round_trip);
criterion_main!(benches);
