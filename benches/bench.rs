use criterion::{black_box, criterion_group, criterion_main, Criterion};
use job_racer::{Policy, Racer};
use std::time::Duration;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("race 1", |b| b.iter(|| race_test(black_box(1), Policy::Tolerant)));
    c.bench_function("race 10", |b| b.iter(|| race_test(black_box(10), Policy::Tolerant)));
    c.bench_function("race 100", |b| {
        b.iter(|| race_test(black_box(100), Policy::Tolerant))
    });
    c.bench_function("race_ok 10", |b| {
        b.iter(|| race_test(black_box(10), Policy::Intolerant))
    });
    c.bench_function("race_ok 100", |b| {
        b.iter(|| race_test(black_box(100), Policy::Intolerant))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

/// Race `max` jobs where only the last one succeeds.
pub(crate) fn race_test(max: usize, policy: Policy) {
    let mut racer = Racer::<usize, usize>::new();
    racer
        .set_policy(policy)
        .set_timeout(Duration::from_secs(10))
        .add_jobs((0..max).map(|n| move || if n + 1 == max { Ok(n) } else { Err(n) }));

    let outcome = racer.run_blocking();
    match policy {
        Policy::Tolerant => {
            black_box(outcome);
        }
        Policy::Intolerant => assert_eq!(outcome, Ok(Some(max - 1))),
    }
}
