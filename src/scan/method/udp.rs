use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    time::{Duration, Instant},
};

use crate::{
    cancel::{self, CancelToken},
    scan::{Executor, PortState, Protocol},
};

const LOCAL: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

/// Sends an empty datagram and waits for any reply.
///
/// Silence can't tell a closed port from a filtered one, both end up closed.
/// The socket stays unconnected, so ICMP unreachable messages aren't
/// reported back and never turn into errors.
#[derive(Debug)]
pub struct UdpScan;

impl Executor for UdpScan {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    fn scan(
        &self,
        addr: &SocketAddrV4,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<PortState> {
        let socket = UdpSocket::bind(LOCAL)?;
        socket.send_to(&[], addr)?;

        let deadline = Instant::now() + timeout;
        let mut buf = [0; 1024];
        loop {
            if cancel.is_cancelled() {
                return Err(ErrorKind::Interrupted.into());
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(PortState::Closed);
            }

            socket.set_read_timeout(Some(left.min(cancel::POLL_INTERVAL)))?;
            match socket.recv_from(&mut buf) {
                Ok(_) => return Ok(PortState::Open),
                // Unix reports an expired read timeout as `WouldBlock`, and a
                // signal cuts a timed read short with `Interrupted`.
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e),
            }
        }
    }
}
