use criterion::{black_box, criterion_group, criterion_main, Criterion};
use firerule::{field, Condition, Expr, Fact};

/// An expression ANDing `n` comparisons, each on its own field, and a fact
/// that satisfies all of them.
fn build_expr(n: usize) -> (Expr, Fact) {
    let mut fact = Fact::new("bench");
    let mut expr = field("f0").gte(1_i64);
    fact.insert("f0", 10_i64.into());
    for i in 1..n {
        let name = format!("f{i}");
        expr = expr.and(field(&name).gte(1_i64));
        fact.insert(&name, 10_i64.into());
    }
    (expr, fact)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition");

    for &n in &[5, 20, 50] {
        let (expr, fact) = build_expr(n);
        group.bench_function(format!("{n}_comparisons"), |b| {
            b.iter(|| expr.evaluate(black_box(&fact)));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let text = r#"(temp > 90 AND pressure <= 2.5) OR (status == "fault" AND NOT maintenance)"#;
    c.bench_function("parse_expression", |b| {
        b.iter(|| Expr::parse(black_box(text)));
    });
}

criterion_group!(benches, bench_evaluate, bench_parse);
criterion_main!(benches);
