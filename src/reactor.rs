//! Background readiness loop shared by all sockets.
//!
//! One thread owns a `mio::Poll`. Sockets register with edge-triggered
//! READABLE|WRITABLE interest and are looked up through a slab of weak
//! handles when events arrive; the socket then finishes whatever
//! operation was parked on it. A `mio::Waker` interrupts the poll for
//! shutdown.

use crate::socket::TcpSocket;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use slab::Slab;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

const WAKER_TOKEN: Token = Token(usize::MAX);

/// The shared poll loop.
pub struct Reactor {
    registry: Registry,
    waker: Waker,
    sockets: Mutex<Slab<Weak<TcpSocket>>>,
    shutdown: AtomicBool,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Reactor {
    /// Start the poll thread.
    pub fn new() -> io::Result<Arc<Self>> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;

        let reactor = Arc::new(Self {
            registry,
            waker,
            sockets: Mutex::new(Slab::new()),
            shutdown: AtomicBool::new(false),
            thread: Mutex::new(None),
        });

        let weak = Arc::downgrade(&reactor);
        let handle = thread::Builder::new()
            .name("byteline-reactor".into())
            .spawn(move || run(poll, weak))?;
        *reactor.thread.lock() = Some(handle);

        Ok(reactor)
    }

    /// Reserve a token for a socket about to be registered.
    pub(crate) fn reserve(&self) -> Token {
        Token(self.sockets.lock().insert(Weak::new()))
    }

    /// Publish the socket handle for `token` and enable event delivery.
    ///
    /// The handle is published before the fd is registered so an event
    /// arriving immediately still finds its socket.
    pub(crate) fn register(
        &self,
        token: Token,
        fd: RawFd,
        socket: &Arc<TcpSocket>,
    ) -> io::Result<()> {
        if let Some(slot) = self.sockets.lock().get_mut(token.0) {
            *slot = Arc::downgrade(socket);
        }
        self.registry.register(
            &mut SourceFd(&fd),
            token,
            Interest::READABLE | Interest::WRITABLE,
        )
    }

    /// Drop a reservation whose registration failed.
    pub(crate) fn cancel(&self, token: Token) {
        let mut sockets = self.sockets.lock();
        if sockets.contains(token.0) {
            sockets.remove(token.0);
        }
    }

    /// Remove a socket from the table and the poll registration.
    pub(crate) fn remove(&self, token: Token, fd: RawFd) {
        {
            let mut sockets = self.sockets.lock();
            if sockets.contains(token.0) {
                sockets.remove(token.0);
            }
        }
        let _ = self.registry.deregister(&mut SourceFd(&fd));
    }

    /// Number of sockets currently registered.
    pub fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Stop the poll thread and wait for it to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.waker.wake();
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        // No join here: the last handle may drop on the poll thread
        // itself (a completion callback owning the final Arc).
        self.shutdown.store(true, Ordering::Release);
        let _ = self.waker.wake();
    }
}

fn run(mut poll: Poll, reactor: Weak<Reactor>) {
    let mut events = Events::with_capacity(1024);
    loop {
        if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(100))) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(error = %e, "reactor poll failed");
            return;
        }

        let Some(reactor) = reactor.upgrade() else {
            return;
        };
        if reactor.shutdown.load(Ordering::Acquire) {
            return;
        }

        for event in events.iter() {
            if event.token() == WAKER_TOKEN {
                continue;
            }
            let socket = {
                let sockets = reactor.sockets.lock();
                sockets.get(event.token().0).and_then(Weak::upgrade)
            };
            if let Some(socket) = socket {
                socket.on_ready(
                    event.is_readable() || event.is_read_closed(),
                    event.is_writable() || event.is_write_closed(),
                    event.is_error(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactor_starts_and_shuts_down() {
        let reactor = Reactor::new().unwrap();
        assert_eq!(reactor.socket_count(), 0);
        reactor.shutdown();
    }

    #[test]
    fn test_reserve_and_cancel() {
        let reactor = Reactor::new().unwrap();
        let token = reactor.reserve();
        assert_eq!(reactor.socket_count(), 1);
        reactor.cancel(token);
        assert_eq!(reactor.socket_count(), 0);
        reactor.shutdown();
    }
}
