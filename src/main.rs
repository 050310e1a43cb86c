use msfifo::harness::{self, Config, Intrusive, Report};
use tracing::{error, info};

pub fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "usage: msfifo [threads] [iterations]");
            std::process::exit(2);
        }
    };

    info!(
        threads = config.threads,
        iterations = config.iterations,
        "starting enqueue-dequeue pairs"
    );

    let queue = Intrusive::new();
    let report = match harness::pairwise(&queue, &config) {
        Ok(r) => r,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let expected = Report::expected_checksum(&config);
    if report.checksum != expected {
        error!(
            checksum = report.checksum,
            expected, "values were lost or duplicated"
        );
        std::process::exit(1);
    }

    info!(
        duration = ?report.elapsed,
        operations = report.operations,
        per_operation = ?report.per_operation(),
        "finished"
    );
}
