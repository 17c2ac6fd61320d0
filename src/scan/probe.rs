use std::{
    any::Any,
    net::{Ipv4Addr, SocketAddrV4},
    panic::{self, AssertUnwindSafe},
    time::Duration,
};

use crate::{cancel::CancelToken, error::ProbeError, resolver, service};

use super::{Executor, PortResult, Protocol};

/// One host, port and protocol to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    host: String,
    port: u16,
    protocol: Protocol,
}

impl ScanTarget {
    pub fn new(host: impl Into<String>, port: u64, protocol: Protocol) -> Result<Self, ProbeError> {
        Ok(Self {
            host: host.into(),
            port: valid_port(port)?,
            protocol,
        })
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

/// Resolves the target's host and probes it once.
pub fn probe(
    target: &ScanTarget,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<PortResult, ProbeError> {
    let ip = resolver::lookup(&target.host)
        .map_err(|e| ProbeError::HostNotFound(target.host.clone(), e))?;
    let executor = target.protocol.executor();

    probe_addr(executor.as_ref(), ip, u64::from(target.port), timeout, cancel)
}

/// Probes `port` on an already resolved address.
pub fn probe_addr(
    executor: &dyn Executor,
    ip: Ipv4Addr,
    port: u64,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<PortResult, ProbeError> {
    let port = valid_port(port)?;
    // Looked up first so the name is known whatever the probe does.
    let service = service::resolve(port, executor.protocol());
    let addr = SocketAddrV4::new(ip, port);

    match panic::catch_unwind(AssertUnwindSafe(|| executor.scan(&addr, timeout, cancel))) {
        Ok(Ok(state)) => Ok(PortResult::new(port, state, service)),
        Ok(Err(e)) => Err(ProbeError::Socket(port, e)),
        Err(payload) => Err(ProbeError::Unexpected(port, panic_message(payload))),
    }
}

fn valid_port(port: u64) -> Result<u16, ProbeError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(ProbeError::InvalidPort(port)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "probe panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, net::TcpListener};

    use super::*;
    use crate::scan::PortState;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[derive(Debug)]
    struct Failing(io::ErrorKind);

    impl Executor for Failing {
        fn protocol(&self) -> Protocol {
            Protocol::Tcp
        }

        fn scan(&self, _: &SocketAddrV4, _: Duration, _: &CancelToken) -> io::Result<PortState> {
            Err(io::Error::from(self.0))
        }
    }

    #[derive(Debug)]
    struct Panicking;

    impl Executor for Panicking {
        fn protocol(&self) -> Protocol {
            Protocol::Tcp
        }

        fn scan(&self, _: &SocketAddrV4, _: Duration, _: &CancelToken) -> io::Result<PortState> {
            panic!("boom")
        }
    }

    #[test]
    fn target_rejects_out_of_range_ports() {
        for port in [0, 65536, 100_000] {
            assert!(matches!(
                ScanTarget::new("127.0.0.1", port, Protocol::Tcp),
                Err(ProbeError::InvalidPort(p)) if p == port
            ));
        }
        assert_eq!(
            ScanTarget::new("127.0.0.1", 65535, Protocol::Udp)
                .unwrap()
                .port(),
            65535
        );
    }

    #[test]
    fn probes_listening_target() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = ScanTarget::new("127.0.0.1", u64::from(port), Protocol::Tcp).unwrap();

        let result = probe(&target, TIMEOUT, &CancelToken::new()).unwrap();
        assert_eq!(result.port, port);
        assert_eq!(result.state, PortState::Open);
    }

    #[test]
    fn unknown_host_is_fatal() {
        let target = ScanTarget::new("does-not-exist.invalid", 80, Protocol::Tcp).unwrap();
        let err = probe(&target, TIMEOUT, &CancelToken::new()).unwrap_err();

        assert!(matches!(err, ProbeError::HostNotFound(..)));
        assert!(err.is_fatal());
    }

    #[test]
    fn socket_errors_are_kept_per_port() {
        let err = probe_addr(
            &Failing(io::ErrorKind::PermissionDenied),
            Ipv4Addr::LOCALHOST,
            443,
            TIMEOUT,
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ProbeError::Socket(443, _)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn panics_become_unexpected_errors() {
        let err = probe_addr(
            &Panicking,
            Ipv4Addr::LOCALHOST,
            80,
            TIMEOUT,
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ProbeError::Unexpected(80, ref msg) if msg == "boom"));
    }
}
