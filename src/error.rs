use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid port format `{0}` (use a number or a range, e.g. 80 or 80-83)")]
    InvalidPortSpec(String),
    #[error("invalid port range `{start}-{end}` (start is greater than end)")]
    InvertedRange { start: u64, end: u64 },
    #[error("specify exactly one protocol: -t for TCP or -u for UDP")]
    MissingProtocol,
    #[error("thread count must be between {min} and {max}, got {0}", min = crate::config::MIN_WORKERS, max = crate::config::MAX_WORKERS)]
    InvalidThreadCount(usize),
    #[error("host `{0}` not found: {1}")]
    HostNotFound(String, #[source] ResolveError),
    #[error("failed to start worker pool: {0}")]
    WorkerPoolFailed(#[source] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to check target kind (ensure it's a domain or IPv4)")]
    HostParseFailed(#[source] url::ParseError),
    #[error("failed to resolve the given target: {0}")]
    ResolverFailed(#[source] std::io::Error),
    #[error("resolver didn't find any IPv4 address mapped by `{0}`")]
    DomainLookupFailed(String),
    #[error("only supports IPv4 addresses or domains that map addresses with this IP version")]
    OnlyIpv4TargetSupported,
}

/// Reasons a single port probe produced no result.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("port {0} is invalid (must be between 1 and 65535)")]
    InvalidPort(u64),
    #[error("host `{0}` not found: {1}")]
    HostNotFound(String, #[source] ResolveError),
    #[error("network error on port {0}: {1}")]
    Socket(u16, #[source] std::io::Error),
    #[error("unexpected error on port {0}: {1}")]
    Unexpected(u16, String),
}

impl ProbeError {
    /// Whether every other probe against the same host would fail the same way.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProbeError::HostNotFound(..) => true,
            ProbeError::InvalidPort(_) | ProbeError::Socket(..) | ProbeError::Unexpected(..) => {
                false
            }
        }
    }
}
