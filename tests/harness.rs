#![cfg(all(feature = "harness", not(loom)))]

use msfifo::harness::{self, BenchQueue, Config, ConfigError, Intrusive, Report};

#[test]
fn pairwise_single_thread() {
    let queue = Intrusive::new();
    let config = Config {
        threads: 1,
        iterations: 1000,
    };

    let report = harness::pairwise(&queue, &config).unwrap();

    assert_eq!(2000, report.operations);
    assert_eq!(Report::expected_checksum(&config), report.checksum);
}

#[test]
fn pairwise_many_threads() {
    let queue = Intrusive::new();
    let config = Config {
        threads: 8,
        iterations: 5000,
    };

    let report = harness::pairwise(&queue, &config).unwrap();

    assert_eq!(Report::expected_checksum(&config), report.checksum);

    let mut handle = queue.register(config.threads);
    assert_eq!(None, queue.dequeue(&mut handle));
}

#[test]
fn config_from_args() {
    let config = Config::from_args(["2", "10"]).unwrap();
    let queue = Intrusive::new();

    let report = harness::pairwise(&queue, &config).unwrap();
    assert_eq!(40, report.operations);
}

#[test]
fn pairwise_rejects_zero_iterations() {
    let queue = Intrusive::new();
    let config = Config {
        threads: 2,
        iterations: 0,
    };

    assert_eq!(
        Err(ConfigError::ZeroIterations),
        harness::pairwise(&queue, &config)
    );
    assert_eq!(0, queue.retained());
}

#[test]
fn fresh_adapter_per_run() {
    let config = Config {
        threads: 2,
        iterations: 500,
    };

    // Reusing an Adapter keeps the Slots of every previous Run alive
    let shared = Intrusive::new();
    for run in 1..=3 {
        harness::pairwise(&shared, &config).unwrap();
        assert_eq!(run * 1000, shared.retained());
    }

    // A new Adapter per Run only ever holds on to the Slots of that Run
    for _ in 0..3 {
        let queue = Intrusive::new();
        harness::pairwise(&queue, &config).unwrap();
        assert_eq!(1000, queue.retained());
    }
}
