use std::{net::UdpSocket, thread, time::Duration};

use tinyscan::{
    cancel::{self, CancelToken},
    config::ScanConfig,
    port::PortSpec,
    scan::{Protocol, ScanEvent, ScanState, Scanner},
};

// Lives in its own binary: the interrupt handler is installed once per process.
#[test]
fn sigint_during_udp_wait_aborts_without_errors() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let cancel = CancelToken::new();
    assert!(cancel::on_interrupt(&cancel));

    let ports = PortSpec::single(u64::from(port));
    let config = ScanConfig::new("127.0.0.1", ports, Protocol::Udp, None)
        .unwrap()
        .with_timeout(Duration::from_secs(3));
    let scanner = Scanner::new(config, cancel.clone());

    // SAFETY: both calls only name the current, still running thread.
    let scanning = unsafe { libc::pthread_self() };
    let killer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        unsafe {
            libc::pthread_kill(scanning, libc::SIGINT);
        }
    });

    let mut skipped = Vec::new();
    let report = scanner
        .run(|event| {
            if let ScanEvent::Skipped(port, e) = event {
                skipped.push(format!("{}: {}", port, e));
            }
        })
        .unwrap();
    killer.join().unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(report.state, ScanState::Aborted);
    assert!(skipped.is_empty(), "unexpected errors: {:?}", skipped);
    assert!(report.results.is_empty());
    assert!(report.elapsed < Duration::from_secs(1));
    drop(server);
}
