//! Completion-style TCP socket.
//!
//! [`TcpSocket`] turns mio's readiness model into the completion model
//! the connection engines are written against: `start_send` and
//! `start_recv` either finish inline — the outcome is returned to the
//! caller synchronously — or park a pending operation that the reactor
//! finishes when the socket becomes ready again, reporting the outcome
//! through the operation context's listener. Exactly one completion is
//! delivered per posted operation.
//!
//! The inline path matters: a receive that completes immediately lets
//! the caller re-arm in a loop without bouncing through the poll thread.

use crate::context::OpContext;
use crate::reactor::Reactor;
use bytes::BytesMut;
use mio::net::TcpStream as MioTcpStream;
use mio::Token;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Outcome of one completed socket operation.
///
/// `Ok(n)` is the number of bytes transferred; a zero-byte receive is a
/// normal peer close. Sends always report the full packet length on
/// success — partial progress is carried across readiness internally.
#[derive(Debug)]
pub struct OpOutcome {
    pub result: io::Result<usize>,
}

/// Callback for an outbound connect; fires exactly once.
pub type ConnectCallback = Box<dyn FnOnce(io::Result<Arc<TcpSocket>>) + Send>;

struct PendingSend {
    ctx: Arc<OpContext>,
    written: usize,
}

struct PendingRecv {
    ctx: Arc<OpContext>,
}

struct PendingConnect {
    on_done: ConnectCallback,
}

/// One connected (or connecting) TCP socket driven by the shared reactor.
pub struct TcpSocket {
    stream: MioTcpStream,
    token: Token,
    reactor: Arc<Reactor>,
    peer: SocketAddr,
    /// Self-handle for completion callbacks.
    this: Weak<TcpSocket>,
    disposed: AtomicBool,
    readable: AtomicBool,
    writable: AtomicBool,
    send_op: Mutex<Option<PendingSend>>,
    recv_op: Mutex<Option<PendingRecv>>,
    connect_op: Mutex<Option<PendingConnect>>,
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "socket disposed")
}

impl TcpSocket {
    /// Adopt an already-connected stream (typically just accepted).
    pub fn from_std(
        reactor: &Arc<Reactor>,
        stream: std::net::TcpStream,
        peer: SocketAddr,
    ) -> io::Result<Arc<Self>> {
        stream.set_nonblocking(true)?;
        let stream = MioTcpStream::from_std(stream);

        let token = reactor.reserve();
        let socket = Arc::new_cyclic(|this| Self {
            stream,
            token,
            reactor: reactor.clone(),
            peer,
            this: this.clone(),
            disposed: AtomicBool::new(false),
            readable: AtomicBool::new(false),
            writable: AtomicBool::new(true),
            send_op: Mutex::new(None),
            recv_op: Mutex::new(None),
            connect_op: Mutex::new(None),
        });
        if let Err(e) = reactor.register(token, socket.stream.as_raw_fd(), &socket) {
            reactor.cancel(token);
            return Err(e);
        }
        Ok(socket)
    }

    /// Begin a nonblocking connect to `remote`.
    ///
    /// `on_done` fires exactly once, possibly inline when setup itself
    /// fails, otherwise from the reactor once the handshake resolves.
    pub fn connect(reactor: &Arc<Reactor>, remote: SocketAddr, on_done: ConnectCallback) {
        let stream = match MioTcpStream::connect(remote) {
            Ok(stream) => stream,
            Err(e) => {
                on_done(Err(e));
                return;
            }
        };

        let token = reactor.reserve();
        let socket = Arc::new_cyclic(|this| Self {
            stream,
            token,
            reactor: reactor.clone(),
            peer: remote,
            this: this.clone(),
            disposed: AtomicBool::new(false),
            readable: AtomicBool::new(false),
            // Not writable until the handshake resolves.
            writable: AtomicBool::new(false),
            send_op: Mutex::new(None),
            recv_op: Mutex::new(None),
            connect_op: Mutex::new(Some(PendingConnect { on_done })),
        });
        if let Err(e) = reactor.register(token, socket.stream.as_raw_fd(), &socket) {
            reactor.cancel(token);
            socket.fail_connect(e);
        }
    }

    /// Remote endpoint this socket was built for.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address, once bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Disable Nagle's algorithm.
    pub fn set_nodelay(&self) -> io::Result<()> {
        self.stream.set_nodelay(true)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Arm a send for the packet bound to `ctx`.
    ///
    /// `Ok(Some(outcome))` — completed inline. `Ok(None)` — parked; the
    /// context listener will fire once. `Err` — the socket is already
    /// disposed and nothing was posted.
    pub fn start_send(&self, ctx: &Arc<OpContext>) -> io::Result<Option<OpOutcome>> {
        let mut op = self.send_op.lock();
        if self.disposed.load(Ordering::Acquire) {
            return Err(aborted());
        }
        debug_assert!(op.is_none(), "send already armed");

        let mut written = 0;
        if self.writable.load(Ordering::Acquire) {
            match self.try_send(ctx, &mut written) {
                Ok(true) => return Ok(Some(OpOutcome { result: Ok(written) })),
                Ok(false) => {}
                Err(e) => return Ok(Some(OpOutcome { result: Err(e) })),
            }
        }
        *op = Some(PendingSend {
            ctx: ctx.clone(),
            written,
        });
        Ok(None)
    }

    /// Arm a receive into `chunk`, the buffer the caller has just bound
    /// to `ctx` and still holds locked for the duration of this call —
    /// a teardown cannot slip between the bind and the post. Same
    /// contract as [`start_send`](Self::start_send).
    pub fn start_recv(
        &self,
        ctx: &Arc<OpContext>,
        chunk: &mut BytesMut,
    ) -> io::Result<Option<OpOutcome>> {
        let mut op = self.recv_op.lock();
        if self.disposed.load(Ordering::Acquire) {
            return Err(aborted());
        }
        debug_assert!(op.is_none(), "receive already armed");

        if self.readable.load(Ordering::Acquire) {
            match self.read_into(&mut chunk[..]) {
                Ok(Some(n)) => return Ok(Some(OpOutcome { result: Ok(n) })),
                Ok(None) => {}
                Err(e) => return Ok(Some(OpOutcome { result: Err(e) })),
            }
        }
        *op = Some(PendingRecv { ctx: ctx.clone() });
        Ok(None)
    }

    /// Tear the socket down: both directions shut down, close bounded by
    /// a linger of `timeout`, any parked operation failed with
    /// `ConnectionAborted`. Idempotent; OS errors are swallowed.
    pub fn dispose(&self, timeout: Duration) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.set_linger(timeout);
        let _ = self.stream.shutdown(Shutdown::Both);
        self.reactor.remove(self.token, self.stream.as_raw_fd());

        let send = self.send_op.lock().take();
        let recv = self.recv_op.lock().take();
        let connect = self.connect_op.lock().take();
        if let Some(pending) = send {
            pending.ctx.complete(OpOutcome {
                result: Err(aborted()),
            });
        }
        if let Some(pending) = recv {
            pending.ctx.complete(OpOutcome {
                result: Err(aborted()),
            });
        }
        if let Some(pending) = connect {
            (pending.on_done)(Err(aborted()));
        }
    }

    /// Bound the eventual close with SO_LINGER. mio does not expose the
    /// option, so borrow the fd through socket2 without adopting it.
    fn set_linger(&self, timeout: Duration) -> io::Result<()> {
        let fd = self.stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = sock.set_linger(Some(timeout));
        std::mem::forget(sock); // don't close the fd
        result
    }

    /// One nonblocking read into `chunk`. `Ok(None)` means the socket is
    /// drained (would block).
    fn read_into(&self, chunk: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            match (&self.stream).read(chunk) {
                Ok(n) => return Ok(Some(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.readable.store(false, Ordering::Release);
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read for a parked receive, under the context's binding lock.
    fn recv_pending(&self, ctx: &OpContext) -> io::Result<Option<usize>> {
        match ctx.with_recv_buffer(|chunk| self.read_into(&mut chunk[..])) {
            Some(result) => result,
            None => {
                debug_assert!(false, "receive armed without a bound chunk");
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "no receive buffer bound",
                ))
            }
        }
    }

    /// Write as much of the bound packet as the socket accepts, resuming
    /// from `written`. `Ok(true)` = fully written, `Ok(false)` = would
    /// block with progress recorded in `written`.
    fn try_send(&self, ctx: &OpContext, written: &mut usize) -> io::Result<bool> {
        loop {
            let result = ctx.with_send_buffer(|packet| {
                if *written >= packet.len() {
                    None
                } else {
                    Some((&self.stream).write(&packet[*written..]))
                }
            });
            let result = match result {
                None => {
                    debug_assert!(false, "send armed without a bound packet");
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "no send buffer bound",
                    ));
                }
                Some(None) => return Ok(true),
                Some(Some(result)) => result,
            };
            match result {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => *written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.writable.store(false, Ordering::Release);
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Readiness delivery from the reactor thread.
    pub(crate) fn on_ready(&self, readable: bool, writable: bool, error: bool) {
        if self.connect_op.lock().is_some() {
            self.finish_connect();
        }
        if readable {
            self.readable.store(true, Ordering::Release);
            self.continue_recv();
        }
        if writable {
            self.writable.store(true, Ordering::Release);
            self.continue_send();
        }
        if error && !readable && !writable {
            // Let the pending operations observe the error themselves.
            self.continue_recv();
            self.continue_send();
        }
    }

    /// Resolve a pending connect. Spurious wakeups keep waiting.
    fn finish_connect(&self) {
        let mut guard = self.connect_op.lock();
        let Some(pending) = guard.take() else {
            return;
        };
        let result = match self.stream.take_error() {
            Ok(Some(e)) => Err(e),
            Err(e) => Err(e),
            Ok(None) => match self.stream.peer_addr() {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                    // Not resolved yet; park again.
                    *guard = Some(pending);
                    return;
                }
                Err(e) => Err(e),
            },
        };
        drop(guard);
        match result {
            Ok(()) => match self.this.upgrade() {
                Some(this) => {
                    self.writable.store(true, Ordering::Release);
                    (pending.on_done)(Ok(this));
                }
                None => (pending.on_done)(Err(aborted())),
            },
            Err(e) => (pending.on_done)(Err(e)),
        }
    }

    /// Fail a connect whose setup never reached the reactor.
    pub(crate) fn fail_connect(&self, error: io::Error) {
        let pending = self.connect_op.lock().take();
        if let Some(pending) = pending {
            (pending.on_done)(Err(error));
        }
    }

    /// Resume a parked receive after readiness.
    fn continue_recv(&self) {
        let pending = self.recv_op.lock().take();
        let Some(pending) = pending else {
            return;
        };
        match self.recv_pending(&pending.ctx) {
            Ok(Some(n)) => pending.ctx.complete(OpOutcome { result: Ok(n) }),
            Ok(None) => {
                let mut op = self.recv_op.lock();
                if self.disposed.load(Ordering::Acquire) {
                    drop(op);
                    pending.ctx.complete(OpOutcome {
                        result: Err(aborted()),
                    });
                } else {
                    *op = Some(pending);
                }
            }
            Err(e) => pending.ctx.complete(OpOutcome { result: Err(e) }),
        }
    }

    /// Resume a parked send after readiness.
    fn continue_send(&self) {
        let pending = self.send_op.lock().take();
        let Some(mut pending) = pending else {
            return;
        };
        match self.try_send(&pending.ctx, &mut pending.written) {
            Ok(true) => {
                let written = pending.written;
                pending.ctx.complete(OpOutcome {
                    result: Ok(written),
                });
            }
            Ok(false) => {
                let mut op = self.send_op.lock();
                if self.disposed.load(Ordering::Acquire) {
                    drop(op);
                    pending.ctx.complete(OpOutcome {
                        result: Err(aborted()),
                    });
                } else {
                    *op = Some(pending);
                }
            }
            Err(e) => pending.ctx.complete(OpOutcome { result: Err(e) }),
        }
    }
}
