use std::fmt::{self, Display};

/// The Configuration for a single Benchmark-Run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The Number of Threads that concurrently access the Queue
    pub threads: usize,
    /// The Number of Enqueue-Dequeue pairs every Thread performs
    pub iterations: usize,
}

/// The Errors that can occur while loading the Config
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The Argument could not be parsed as a Number
    InvalidNumber {
        /// The Name of the Argument
        name: &'static str,
        /// The Value that was given
        value: String,
    },
    /// At least one Thread is needed
    ZeroThreads,
    /// At least one Iteration is needed
    ZeroIterations,
    /// More Arguments than `[threads] [iterations]` were given
    TooManyArguments,
    /// The total Number of Operations does not fit into a `usize`
    TooLarge,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber { name, value } => {
                write!(f, "invalid value for {}: {:?}", name, value)
            }
            Self::ZeroThreads => write!(f, "at least one thread is needed"),
            Self::ZeroIterations => write!(f, "at least one iteration is needed"),
            Self::TooManyArguments => write!(f, "expected at most [threads] [iterations]"),
            Self::TooLarge => write!(f, "threads * iterations is too large"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: Self::DEFAULT_THREADS,
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}

impl Config {
    /// The Number of Threads used if none is given
    pub const DEFAULT_THREADS: usize = 10;
    /// The Number of Iterations used if none is given
    pub const DEFAULT_ITERATIONS: usize = 1000000;

    /// Loads the Config from the positional Arguments `[threads] [iterations]`,
    /// any missing Argument falls back to its Default
    ///
    /// # Example
    /// ```rust
    /// # use msfifo::harness::Config;
    /// let config = Config::from_args(["4"]).unwrap();
    ///
    /// assert_eq!(4, config.threads);
    /// assert_eq!(Config::DEFAULT_ITERATIONS, config.iterations);
    /// ```
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        let mut config = Self::default();

        if let Some(raw) = args.next() {
            config.threads = parse("threads", raw.as_ref())?;
        }
        if let Some(raw) = args.next() {
            config.iterations = parse("iterations", raw.as_ref())?;
        }
        if args.next().is_some() {
            return Err(ConfigError::TooManyArguments);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the Config describes an actual Run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.operations().is_none() {
            return Err(ConfigError::TooLarge);
        }
        Ok(())
    }

    /// The total Number of Enqueues and Dequeues of a Run, if it fits
    pub(super) fn operations(&self) -> Option<usize> {
        self.threads.checked_mul(self.iterations)?.checked_mul(2)
    }
}

fn parse(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: raw.to_string(),
        })
}
