use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use once_cell::sync::OnceCell;

/// Longest a blocked wait goes without looking at its token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag shared by the orchestrator and its probes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

static INTERRUPT: OnceCell<CancelToken> = OnceCell::new();

extern "C" fn handle_interrupt(_: libc::c_int) {
    // Only an atomic store happens here, which is async-signal-safe.
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
}

/// Cancels `token` on SIGINT or SIGTERM.
///
/// Only the first call installs the handlers, later ones return `false`.
pub fn on_interrupt(token: &CancelToken) -> bool {
    if INTERRUPT.set(token.clone()).is_err() {
        return false;
    }

    let handler = handle_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only touches an already initialized static.
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    log::debug!("Interrupt handlers installed");

    true
}
