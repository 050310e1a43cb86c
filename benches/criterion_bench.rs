use criterion::{criterion_group, criterion_main, Criterion};

mod mpmc;


criterion_group!(
    queues,
    mpmc::intrusive_send_recv,
    mpmc::locked_send_recv,
    mpmc::intrusive_pairs,
    mpmc::locked_pairs,
);

criterion_group! {
    name = profiled;
    config = Criterion::default().with_profiler(profiler::FlamegraphProfiler::new(100));
    targets = mpmc::intrusive_pairs,
}

criterion_main!(queues, profiled);
