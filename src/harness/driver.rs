use std::{
    hint,
    sync::Barrier,
    thread,
    time::{Duration, Instant},
};

use super::{BenchQueue, Config, ConfigError};

/// The Result of a single Benchmark-Run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The Time the slowest Thread took for all of its Operations
    pub elapsed: Duration,
    /// The total Number of Operations, counting Enqueues and Dequeues
    pub operations: u64,
    /// The wrapping Sum of all the dequeued Values
    pub checksum: u64,
}

impl Report {
    /// The average Time per Operation across all Threads
    pub fn per_operation(&self) -> Duration {
        self.elapsed.div_f64(self.operations.max(1) as f64)
    }

    /// The Checksum of a Run with the given Config, in which every Value has
    /// been dequeued exactly once
    pub fn expected_checksum(config: &Config) -> u64 {
        // The Values are exactly 0..n, so this is n * (n - 1) / 2 truncated
        // to 64 Bits. Halving the even Factor first keeps it exact
        let total = config.threads as u128 * config.iterations as u128;
        let (left, right) = if total % 2 == 0 {
            (total / 2, total.saturating_sub(1))
        } else {
            (total, (total - 1) / 2)
        };
        (left as u64).wrapping_mul(right as u64)
    }
}

/// Runs the Enqueue-Dequeue-Pairs Benchmark on the given Queue.
///
/// Every Thread registers itself using its Index and then waits for all the
/// other Threads, before alternating between enqueueing a Value and
/// dequeueing one (spinning until one is available) for the configured
/// Number of Iterations. The Values are unique across all Threads.
///
/// # Errors
/// Returns the Error of [`Config::validate`], without touching the Queue
pub fn pairwise<Q>(queue: &Q, config: &Config) -> Result<Report, ConfigError>
where
    Q: BenchQueue,
{
    config.validate()?;
    let operations = config.operations().ok_or(ConfigError::TooLarge)?;

    let threads = config.threads;
    let iterations = config.iterations;
    let barrier = Barrier::new(threads);

    let results: Vec<(Duration, u64)> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|id| {
                let barrier = &barrier;
                s.spawn(move || {
                    let mut handle = queue.register(id);
                    barrier.wait();

                    let start = Instant::now();
                    let mut checksum = 0u64;
                    for i in 0..iterations {
                        queue.enqueue(&mut handle, (id * iterations + i) as u64);

                        let value = loop {
                            if let Some(v) = queue.dequeue(&mut handle) {
                                break v;
                            }
                            hint::spin_loop();
                        };
                        checksum = checksum.wrapping_add(value);
                    }

                    (start.elapsed(), checksum)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let elapsed = results
        .iter()
        .map(|(elapsed, _)| *elapsed)
        .max()
        .unwrap_or_default();
    let checksum = results
        .iter()
        .fold(0u64, |acc, (_, sum)| acc.wrapping_add(*sum));

    Ok(Report {
        elapsed,
        operations: operations as u64,
        checksum,
    })
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::harness::Intrusive;

    /// Only counts the Registrations and hands every Value straight back
    struct Echo {
        registered: AtomicUsize,
    }

    impl BenchQueue for Echo {
        type Handle = Option<u64>;

        fn register(&self, _id: usize) -> Self::Handle {
            self.registered.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn enqueue(&self, handle: &mut Self::Handle, value: u64) {
            *handle = Some(value);
        }

        fn dequeue(&self, handle: &mut Self::Handle) -> Option<u64> {
            handle.take()
        }
    }

    #[test]
    fn registers_every_thread() {
        let queue = Echo {
            registered: AtomicUsize::new(0),
        };
        let config = Config {
            threads: 3,
            iterations: 10,
        };

        let report = pairwise(&queue, &config).unwrap();

        assert_eq!(3, queue.registered.load(Ordering::SeqCst));
        assert_eq!(60, report.operations);
        assert_eq!(Report::expected_checksum(&config), report.checksum);
    }

    #[test]
    fn intrusive_checksum() {
        let queue = Intrusive::new();
        let config = Config {
            threads: 4,
            iterations: 2000,
        };

        let report = pairwise(&queue, &config).unwrap();

        assert_eq!(Report::expected_checksum(&config), report.checksum);
        assert_eq!(None, queue.dequeue(&mut queue.register(0)));
    }

    #[test]
    fn rejects_invalid_config() {
        let queue = Echo {
            registered: AtomicUsize::new(0),
        };
        let config = Config {
            threads: 0,
            iterations: 10,
        };

        assert_eq!(Err(ConfigError::ZeroThreads), pairwise(&queue, &config));
        assert_eq!(0, queue.registered.load(Ordering::SeqCst));
    }

    #[test]
    fn checksum_matches_sum() {
        for (threads, iterations) in [(1, 1), (1, 10), (3, 7), (10, 1000)] {
            let config = Config {
                threads,
                iterations,
            };
            let expected =
                (0..(threads * iterations) as u64).fold(0u64, |acc, v| acc.wrapping_add(v));
            assert_eq!(expected, Report::expected_checksum(&config));
        }

        // Wraps just like the Sum of the dequeued Values does
        let config = Config {
            threads: 1 << 16,
            iterations: 1 << 16,
        };
        let n = 1u128 << 32;
        assert_eq!(
            (n * (n - 1) / 2) as u64,
            Report::expected_checksum(&config)
        );
    }

    #[test]
    fn per_operation() {
        let report = Report {
            elapsed: Duration::from_secs(1),
            operations: 4,
            checksum: 0,
        };
        assert_eq!(Duration::from_millis(250), report.per_operation());
    }
}
