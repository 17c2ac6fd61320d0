use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, SocketAddrV4},
    os::fd::AsRawFd,
    time::{Duration, Instant},
};

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};

use crate::{
    cancel::{self, CancelToken},
    scan::{Executor, PortState, Protocol},
};

/// Full connect: open if the handshake completes within the timeout.
///
/// The connect is nonblocking and waited on in short slices, so a cancelled
/// scan never sits on a pending handshake.
#[derive(Debug)]
pub struct TcpScan;

fn classify(e: io::Error) -> io::Result<PortState> {
    match e.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::TimedOut => Ok(PortState::Closed),
        _ => Err(e),
    }
}

impl Executor for TcpScan {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    fn scan(
        &self,
        addr: &SocketAddrV4,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<PortState> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(SockProtocol::TCP))?;
        socket.set_nonblocking(true)?;

        match socket.connect(&SocketAddr::V4(*addr).into()) {
            Ok(()) => return Ok(PortState::Open),
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => return classify(e),
        }

        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(ErrorKind::Interrupted.into());
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(PortState::Closed);
            }

            let mut fd = libc::pollfd {
                fd: socket.as_raw_fd(),
                events: libc::POLLOUT,
                revents: 0,
            };
            let slice = left.min(cancel::POLL_INTERVAL).as_millis().max(1) as libc::c_int;
            // SAFETY: `fd` points to a single valid pollfd for the whole call.
            let ready = unsafe { libc::poll(&mut fd, 1, slice) };

            match ready {
                0 => continue,
                n if n < 0 => {
                    let e = io::Error::last_os_error();
                    if e.kind() != ErrorKind::Interrupted {
                        return Err(e);
                    }
                }
                // Socket is dropped on return, closing the connection.
                _ => {
                    return match socket.take_error()? {
                        None => Ok(PortState::Open),
                        Some(e) => classify(e),
                    }
                }
            }
        }
    }
}
