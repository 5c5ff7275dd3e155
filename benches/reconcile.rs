use criterion::{Criterion, criterion_group, criterion_main};
use csv_reconcile::{
    Dataset, FieldRule, FieldRuleSet, KeySelection, Reconciler,
    data::Value,
    key::detect_primary_key,
    rules::FuzzyMetric,
};

fn generate(rows: usize, drift: bool) -> Dataset {
    let columns = ["id", "name", "amount", "status"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let data = (0..rows)
        .map(|i| {
            let status = match i % 3 {
                0 => "shipped",
                1 => "pending",
                _ => "processing",
            };
            let name = if drift && i % 7 == 0 {
                format!("customer {i}x")
            } else {
                format!("customer {i}")
            };
            let amount = (i % 500) as f64 * 1.25 + if drift && i % 11 == 0 { 0.5 } else { 0.0 };
            vec![
                Some(Value::Integer(i as i64)),
                Some(Value::String(name)),
                Some(Value::Float(amount)),
                Some(Value::String(status.to_string())),
            ]
        })
        .collect();
    Dataset::from_rows(columns, data).expect("dataset")
}

fn bench_reconcile(c: &mut Criterion) {
    let old = generate(20_000, false);
    let new = generate(20_000, true);
    let rules = FieldRuleSet::new()
        .with_rule(
            "name",
            FieldRule::Fuzzy {
                threshold: 90.0,
                metric: FuzzyMetric::Indel,
                case_insensitive: false,
            },
        )
        .with_rule("amount", FieldRule::Tolerance { epsilon: 0.01 })
        .with_include_missing_records(true);

    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);
    group.bench_function("explicit_key", |b| {
        b.iter(|| {
            Reconciler::new(&rules)
                .with_key(KeySelection::Explicit(vec!["id".to_string()]))
                .run(&old, &new)
                .expect("reconcile")
        })
    });
    group.bench_function("without_summaries", |b| {
        b.iter(|| {
            Reconciler::new(&rules)
                .with_key(KeySelection::Explicit(vec!["id".to_string()]))
                .with_summaries(false)
                .run(&old, &new)
                .expect("reconcile")
        })
    });
    group.bench_function("detect_key", |b| b.iter(|| detect_primary_key(&old, &new)));
    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
