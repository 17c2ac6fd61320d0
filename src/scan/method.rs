mod tcp;
mod udp;

pub use tcp::TcpScan;
pub use udp::UdpScan;
