//! Connection monitoring.
//!
//! A [`ConnectionMonitor`] is the process-wide observer of connection
//! activity. The send and receive engines emit each notification exactly
//! once per transition; the monitor may aggregate or drop them freely.
//! The one query, [`is_send_blocked`](ConnectionMonitor::is_send_blocked),
//! lets the monitor throttle outbound traffic: while it reports `true`,
//! drains are deferred until the next `enqueue_send`.

use crate::metrics;
use std::sync::atomic::{AtomicBool, Ordering};

/// Observer of connection lifecycle and traffic.
///
/// Queries and notifications may be issued while a connection holds an
/// internal lock (`is_send_blocked` under the send lock,
/// `receive_starting` under a context binding lock), so implementations
/// must be cheap and lock-free and must never call back into a
/// connection.
pub trait ConnectionMonitor: Send + Sync {
    /// Whether new sends must be deferred.
    fn is_send_blocked(&self) -> bool {
        false
    }

    /// Bytes were appended to a send queue.
    fn send_scheduled(&self, _bytes: usize) {}

    /// A coalesced packet of `bytes` is about to be posted.
    fn send_starting(&self, _bytes: usize) {}

    /// A send finished; `bytes` is zero when it failed.
    fn send_completed(&self, _bytes: usize) {}

    /// A receive was armed.
    fn receive_starting(&self) {}

    /// A receive finished; `bytes` is zero on error or peer close.
    fn receive_completed(&self, _bytes: usize) {}

    /// `bytes` were handed to a consumer and their buffers released.
    fn receive_dispatched(&self, _bytes: usize) {}

    /// A connection transitioned to closed.
    fn closed(&self) {}
}

/// Default monitor: feeds the global metric counters and exposes a
/// manually settable send-blocked flag.
#[derive(Default)]
pub struct StatsMonitor {
    send_blocked: AtomicBool,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttle (or release) all outbound drains.
    pub fn set_send_blocked(&self, blocked: bool) {
        self.send_blocked.store(blocked, Ordering::Release);
    }
}

impl ConnectionMonitor for StatsMonitor {
    fn is_send_blocked(&self) -> bool {
        self.send_blocked.load(Ordering::Acquire)
    }

    fn send_scheduled(&self, bytes: usize) {
        metrics::SEND_BYTES_SCHEDULED.add(bytes as u64);
    }

    fn send_completed(&self, bytes: usize) {
        if bytes > 0 {
            metrics::SEND_PACKETS.increment();
            metrics::SEND_BYTES.add(bytes as u64);
        }
    }

    fn receive_completed(&self, bytes: usize) {
        if bytes > 0 {
            metrics::RECV_PACKETS.increment();
            metrics::RECV_BYTES.add(bytes as u64);
        }
    }

    fn receive_dispatched(&self, bytes: usize) {
        metrics::RECV_BYTES_DISPATCHED.add(bytes as u64);
    }

    fn closed(&self) {
        metrics::CONNECTIONS_CLOSED.increment();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_blocked_toggles() {
        let monitor = StatsMonitor::new();
        assert!(!monitor.is_send_blocked());

        monitor.set_send_blocked(true);
        assert!(monitor.is_send_blocked());

        monitor.set_send_blocked(false);
        assert!(!monitor.is_send_blocked());
    }

    #[test]
    fn test_default_trait_is_unblocked() {
        struct Quiet;
        impl ConnectionMonitor for Quiet {}

        let monitor = Quiet;
        assert!(!monitor.is_send_blocked());
        // Notifications are no-ops but must be callable.
        monitor.send_scheduled(1);
        monitor.send_starting(1);
        monitor.send_completed(1);
        monitor.receive_starting();
        monitor.receive_completed(1);
        monitor.receive_dispatched(1);
        monitor.closed();
    }
}
