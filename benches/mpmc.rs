use std::{collections::VecDeque, ptr::NonNull, sync::Mutex};

use criterion::{black_box, Criterion, Throughput};
use msfifo::{
    harness::{self, BenchQueue, Config, Intrusive},
    queues::mpmc::intrusive::{Linked, Links, Queue},
};

struct Entry {
    links: Links<Entry>,
    value: u64,
}

unsafe impl Linked for Entry {
    type Handle = NonNull<Entry>;

    const LINKS_OFFSET: usize = std::mem::offset_of!(Entry, links);

    fn into_ptr(handle: NonNull<Entry>) -> NonNull<Entry> {
        handle
    }

    unsafe fn from_ptr(ptr: NonNull<Entry>) -> NonNull<Entry> {
        ptr
    }
}

/// The Lock-based Baseline to compare against
struct Locked(Mutex<VecDeque<u64>>);

impl BenchQueue for Locked {
    type Handle = ();

    fn register(&self, _id: usize) {}

    fn enqueue(&self, _handle: &mut (), value: u64) {
        self.0.lock().unwrap().push_back(value);
    }

    fn dequeue(&self, _handle: &mut ()) -> Option<u64> {
        self.0.lock().unwrap().pop_front()
    }
}

const THREADS: [usize; 3] = [1, 2, 4];

pub fn intrusive_send_recv(ctx: &mut Criterion) {
    let mut group = ctx.benchmark_group("mpmc-intrusive");

    group.throughput(Throughput::Elements(2));

    group.bench_function("send-recv", |b| {
        let entry = Entry {
            links: Links::new(),
            value: 13,
        };
        let queue = Box::pin(Queue::<Entry>::new());
        queue.as_ref().init();

        b.iter(|| {
            queue.as_ref().send(NonNull::from(&entry));
            let received = queue
                .as_ref()
                .recv()
                .map(|e| unsafe { e.as_ref() }.value);
            assert_eq!(Some(13), black_box(received));
        });
    });
}

pub fn locked_send_recv(ctx: &mut Criterion) {
    let mut group = ctx.benchmark_group("mpmc-locked");

    group.throughput(Throughput::Elements(2));

    group.bench_function("send-recv", |b| {
        let queue = Locked(Mutex::new(VecDeque::new()));
        let mut handle = queue.register(0);

        b.iter(|| {
            queue.enqueue(&mut handle, black_box(13));
            assert_eq!(Some(13), queue.dequeue(&mut handle));
        });
    });
}

/// Every Sample runs on a new Queue created by `make`, so the Memory retained
/// by a Queue is freed again at the End of the Sample
fn bench_pairs<Q, F>(ctx: &mut Criterion, name: &str, make: F)
where
    Q: BenchQueue,
    F: Fn() -> Q,
{
    let mut group = ctx.benchmark_group(name);

    for threads in THREADS {
        group.throughput(criterion::Throughput::Elements(2 * threads as u64));

        group.bench_function(format!("pairs-{}-threads", threads), |b| {
            b.iter_custom(|iters| {
                let config = Config {
                    threads,
                    iterations: iters as usize,
                };
                let queue = make();
                harness::pairwise(&queue, &config)
                    .expect("criterion runs at least one iteration")
                    .elapsed
            });
        });
    }
}

pub fn intrusive_pairs(ctx: &mut Criterion) {
    bench_pairs(ctx, "mpmc-intrusive-concurrent", Intrusive::new);
}

pub fn locked_pairs(ctx: &mut Criterion) {
    bench_pairs(ctx, "mpmc-locked-concurrent", || {
        Locked(Mutex::new(VecDeque::new()))
    });
}
