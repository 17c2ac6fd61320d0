use std::time::Duration;

use crate::{error::ScanError, port::PortSpec, scan::Protocol};

pub const MIN_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 100;

/// Workers used when `--threads` is given without a value.
pub const DEFAULT_WORKERS: usize = MAX_WORKERS;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Sequential,
    Workers(usize),
}

impl Concurrency {
    /// `None` means sequential, otherwise the count must lie in [2, 100].
    pub fn from_threads(threads: Option<usize>) -> Result<Self, ScanError> {
        match threads {
            None => Ok(Concurrency::Sequential),
            Some(n) if (MIN_WORKERS..=MAX_WORKERS).contains(&n) => Ok(Concurrency::Workers(n)),
            Some(n) => Err(ScanError::InvalidThreadCount(n)),
        }
    }
}

/// Everything one scan run needs, fixed for its whole duration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub host: String,
    pub ports: PortSpec,
    pub protocol: Protocol,
    pub concurrency: Concurrency,
    pub timeout: Duration,
}

impl ScanConfig {
    pub fn new(
        host: impl Into<String>,
        ports: PortSpec,
        protocol: Protocol,
        threads: Option<usize>,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            host: host.into(),
            ports,
            protocol,
            concurrency: Concurrency::from_threads(threads)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
