use std::{
    fmt::{Debug, Display},
    io,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    time::{Duration, Instant},
};

use rayon::ThreadPoolBuilder;

use crate::{
    cancel::{self, CancelToken},
    config::{Concurrency, ScanConfig},
    error::{ProbeError, ScanError},
    resolver,
};

pub use self::{
    method::{TcpScan, UdpScan},
    probe::{probe, probe_addr, ScanTarget},
};

mod method;
mod probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn executor(self) -> Arc<dyn Executor> {
        match self {
            Protocol::Tcp => Arc::new(TcpScan),
            Protocol::Udp => Arc::new(UdpScan),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Protocol::Tcp => "TCP",
                Protocol::Udp => "UDP",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
}

impl Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PortState::Open => "open",
                PortState::Closed => "closed",
            }
        )
    }
}

/// A single reachability check over one protocol.
///
/// Implementations classify what they can into a [`PortState`] and hand
/// back any other socket error untouched. A wait must give up with
/// [`io::ErrorKind::Interrupted`] once `cancel` flips.
pub trait Executor: Debug + Send + Sync {
    fn protocol(&self) -> Protocol;

    fn scan(
        &self,
        addr: &SocketAddrV4,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<PortState>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    pub service: &'static str,
}

impl PortResult {
    fn new(port: u16, state: PortState, service: &'static str) -> Self {
        Self {
            port,
            state,
            service,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

impl Display for PortResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Port {} is {} ({})", self.port, self.state, self.service)
    }
}

/// Emitted as soon as a port is done, in completion order.
#[derive(Debug)]
pub enum ScanEvent<'a> {
    Probed(&'a PortResult),
    Skipped(u64, &'a ProbeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Completed,
    Aborted,
}

#[derive(Debug)]
pub struct ScanReport {
    pub state: ScanState,
    /// Results in the order they were collected.
    pub results: Vec<PortResult>,
    pub skipped: Vec<u64>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn open_ports(&self) -> Summary<'_> {
        Summary(self.results.iter().filter(|r| r.is_open()).collect())
    }
}

/// Open ports of a run, rendered as the closing block of the output.
#[derive(Debug)]
pub struct Summary<'a>(Vec<&'a PortResult>);

impl Summary<'_> {
    pub fn ports(&self) -> Vec<u16> {
        self.0.iter().map(|r| r.port).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "\nNo open ports found.");
        }

        write!(f, "\nThe open ports are: ")?;
        self.0
            .iter()
            .try_for_each(|r| write!(f, "\n{} ({})", r.port, r.service))
    }
}

#[derive(Default)]
struct Collector {
    results: Vec<PortResult>,
    skipped: Vec<u64>,
}

impl Collector {
    /// Returns `false` once the run can't go on.
    fn record<F>(
        &mut self,
        port: u64,
        outcome: Result<PortResult, ProbeError>,
        on_event: &mut F,
    ) -> bool
    where
        F: FnMut(ScanEvent<'_>),
    {
        match outcome {
            Ok(result) => {
                on_event(ScanEvent::Probed(&result));
                self.results.push(result);
                true
            }
            Err(e) => {
                log::debug!("Skipping port {}: {:?}", port, e);
                on_event(ScanEvent::Skipped(port, &e));
                self.skipped.push(port);
                !e.is_fatal()
            }
        }
    }

    fn finish(self, state: ScanState, elapsed: Duration) -> ScanReport {
        ScanReport {
            state,
            results: self.results,
            skipped: self.skipped,
            elapsed,
        }
    }
}

/// Whether a probe only failed because the scan was cancelled under it.
fn cut_short(outcome: &Result<PortResult, ProbeError>, cancel: &CancelToken) -> bool {
    match outcome {
        Err(ProbeError::Socket(_, e)) => {
            e.kind() == io::ErrorKind::Interrupted && cancel.is_cancelled()
        }
        _ => false,
    }
}

pub struct Scanner {
    config: ScanConfig,
    executor: Arc<dyn Executor>,
    cancel: CancelToken,
}

impl Scanner {
    pub fn new(config: ScanConfig, cancel: CancelToken) -> Self {
        let executor = config.protocol.executor();

        Self {
            config,
            executor,
            cancel,
        }
    }

    /// Replaces the protocol's default probe.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Scans every configured port, reporting each one through `on_event`.
    ///
    /// Only host resolution and worker pool setup fail the whole run. Any
    /// other failure is scoped to its port and reported as a skip.
    pub fn run<F>(&self, mut on_event: F) -> Result<ScanReport, ScanError>
    where
        F: FnMut(ScanEvent<'_>),
    {
        let host = &self.config.host;
        let ip = resolver::lookup(host).map_err(|e| ScanError::HostNotFound(host.clone(), e))?;

        log::debug!(
            "Scanning {} {} port(s) ({}) of `{}` with {:?}",
            self.config.ports.port_count(),
            self.config.protocol,
            self.config.ports,
            ip,
            self.config.concurrency
        );

        let now = Instant::now();
        let mut collector = Collector::default();
        let state = match self.config.concurrency {
            Concurrency::Sequential => self.run_sequential(ip, &mut collector, &mut on_event),
            Concurrency::Workers(workers) => {
                self.run_pooled(ip, workers, &mut collector, &mut on_event)?
            }
        };
        let elapsed = now.elapsed();

        log::debug!("Scan {:?} after {:.4}s", state, elapsed.as_secs_f32());

        Ok(collector.finish(state, elapsed))
    }

    fn run_sequential<F>(
        &self,
        ip: Ipv4Addr,
        collector: &mut Collector,
        on_event: &mut F,
    ) -> ScanState
    where
        F: FnMut(ScanEvent<'_>),
    {
        for port in self.config.ports.iter() {
            if self.cancel.is_cancelled() {
                return ScanState::Aborted;
            }

            let outcome = probe_addr(
                self.executor.as_ref(),
                ip,
                port,
                self.config.timeout,
                &self.cancel,
            );
            if cut_short(&outcome, &self.cancel) {
                return ScanState::Aborted;
            }
            if !collector.record(port, outcome, on_event) {
                return ScanState::Aborted;
            }
        }

        if self.cancel.is_cancelled() {
            ScanState::Aborted
        } else {
            ScanState::Completed
        }
    }

    fn run_pooled<F>(
        &self,
        ip: Ipv4Addr,
        workers: usize,
        collector: &mut Collector,
        on_event: &mut F,
    ) -> Result<ScanState, ScanError>
    where
        F: FnMut(ScanEvent<'_>),
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("probe-{}", i))
            .build()
            .map_err(ScanError::WorkerPoolFailed)?;

        // Stops queued probes once this run is over, whatever the reason.
        let stop = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        for port in self.config.ports.iter() {
            let tx = tx.clone();
            let executor = Arc::clone(&self.executor);
            let cancel = self.cancel.clone();
            let stop = stop.clone();
            let timeout = self.config.timeout;

            pool.spawn(move || {
                if cancel.is_cancelled() || stop.is_cancelled() {
                    return;
                }
                let outcome = probe_addr(executor.as_ref(), ip, port, timeout, &cancel);
                if cut_short(&outcome, &cancel) {
                    return;
                }
                // Receiver is gone when the run was aborted.
                let _ = tx.send((port, outcome));
            });
        }
        drop(tx);

        let state = loop {
            if self.cancel.is_cancelled() {
                break ScanState::Aborted;
            }

            match rx.recv_timeout(cancel::POLL_INTERVAL) {
                Ok((port, outcome)) => {
                    if !collector.record(port, outcome, on_event) {
                        break ScanState::Aborted;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break ScanState::Completed,
            }
        };

        stop.cancel();

        // Dropping the pool doesn't wait for probes still in flight.
        Ok(state)
    }
}
