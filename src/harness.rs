//! # Benchmark-Harness
//! A small Harness to compare the Throughput of different Queue
//! implementations using the same Driver-Loop.
//!
//! Every Thread of the Driver first registers itself with the Queue, using
//! its Index, and then uses the returned Handle for all of its Operations on
//! the Queue. The Queues themselves are free to ignore the Handle, if they
//! dont need any per-Thread State.
//!
//! # Example
//! ```rust
//! # use msfifo::harness::{self, Config, Intrusive};
//! let queue = Intrusive::new();
//! let config = Config {
//!     threads: 2,
//!     iterations: 100,
//! };
//!
//! let report = harness::pairwise(&queue, &config).unwrap();
//! assert_eq!(400, report.operations);
//! assert_eq!(harness::Report::expected_checksum(&config), report.checksum);
//! ```

mod config;
pub use config::{Config, ConfigError};

mod driver;
pub use driver::{pairwise, Report};

mod intrusive;
pub use intrusive::{Intrusive, IntrusiveHandle};

/// A Queue that can be driven by the Benchmark-Harness
pub trait BenchQueue: Sync {
    /// The per-Thread Handle used for the Operations
    type Handle;

    /// Obtains the Handle for the Thread with the given Index, the Index is
    /// unique for every Thread of a single Run
    fn register(&self, id: usize) -> Self::Handle;

    /// Enqueues the Value
    fn enqueue(&self, handle: &mut Self::Handle, value: u64);

    /// Attempts to dequeue a Value, returning None if the Queue was empty
    fn dequeue(&self, handle: &mut Self::Handle) -> Option<u64>;
}
