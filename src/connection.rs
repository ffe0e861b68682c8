//! The TCP connection core.
//!
//! A [`TcpConnection`] owns one connected socket and runs two engines
//! over it:
//!
//! - **Outbound coalescing**: producers push byte slices into a queue
//!   from any thread; a single drainer concatenates them into packets of
//!   up to the configured ceiling and keeps exactly one send in flight.
//!   Bytes leave the socket in enqueue order, and slices from one
//!   `enqueue_send` call are contiguous on the wire.
//! - **Inbound dispatch**: a perpetual receive loop arms the socket with
//!   chunks from the shared buffer pool, queues each filled range in
//!   reception order, and hands queued batches to the single registered
//!   consumer. A filled range retains the whole loaned chunk; after the
//!   consumer returns, the original chunk — never a narrowed view — goes
//!   back to the pool.
//!
//! Close is single-shot: whichever of OS error, peer close or an
//! explicit `close()` happens first tears the socket down, releases the
//! pooled resources and fires the close listener exactly once. No
//! callback runs while any connection lock is held.

use crate::connector::Connector;
use crate::context::{CompletionListener, OpBuffer, OpContext};
use crate::error::Error;
use crate::metrics;
use crate::runtime::Runtime;
use crate::socket::{OpOutcome, TcpSocket};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// Why a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end (zero-byte receive). A normal close.
    PeerClosed,
    /// `close()` was called locally.
    Requested,
    /// A transport error terminated the connection.
    Error(io::ErrorKind),
}

impl CloseReason {
    /// True for transport errors, false for normal closes.
    pub fn is_error(&self) -> bool {
        matches!(self, CloseReason::Error(_))
    }
}

/// A received byte range.
///
/// Owns the entire loaned pool chunk but exposes only the filled prefix.
/// Chunks are only valid for the duration of the consumer call that
/// observes them; consumers that retain data must copy it.
pub struct RecvChunk {
    chunk: BytesMut,
    len: usize,
}

impl RecvChunk {
    /// The received bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.chunk[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Recover the full loaned chunk for return to the pool.
    fn into_chunk(self) -> BytesMut {
        self.chunk
    }
}

/// Consumer for received byte ranges. Invoked outside all connection
/// locks; may re-register synchronously from within its own invocation.
pub type ReceiveCallback = Box<dyn FnOnce(&Arc<TcpConnection>, &[RecvChunk]) + Send>;

/// Close listener; fires exactly once per connection.
pub type CloseCallback = Box<dyn FnOnce(&Arc<TcpConnection>, CloseReason) + Send>;

/// Advisory counters. Monotonic while the connection is open, frozen
/// once it closes.
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub sends_posted: u64,
    pub receives_posted: u64,
    pub completion_callbacks: u64,
}

struct SendState {
    queue: VecDeque<Bytes>,
    in_flight: bool,
    socket: Option<Arc<TcpSocket>>,
    ctx: Option<Arc<OpContext>>,
    /// Reusable staging allocation for packet assembly.
    staging: Option<BytesMut>,
}

struct RecvState {
    queue: Vec<RecvChunk>,
    consumer: Option<ReceiveCallback>,
    ctx: Option<Arc<OpContext>>,
}

/// One bidirectional byte-pipe over a connected socket.
pub struct TcpConnection {
    id: u64,
    remote: SocketAddr,
    verbose: bool,
    runtime: Arc<Runtime>,
    /// Self-handle for callbacks; never extends our own lifetime.
    this: Weak<TcpConnection>,
    closed: AtomicBool,
    close_reason: Mutex<Option<CloseReason>>,
    send: Mutex<SendState>,
    recv: Mutex<RecvState>,
    on_close: Mutex<Option<CloseCallback>>,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    sends_posted: AtomicU64,
    receives_posted: AtomicU64,
    completion_callbacks: AtomicU64,
}

impl TcpConnection {
    fn unbound(runtime: Arc<Runtime>, remote: SocketAddr, verbose: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            remote,
            verbose,
            runtime,
            this: this.clone(),
            closed: AtomicBool::new(false),
            close_reason: Mutex::new(None),
            send: Mutex::new(SendState {
                queue: VecDeque::new(),
                in_flight: false,
                socket: None,
                ctx: None,
                staging: None,
            }),
            recv: Mutex::new(RecvState {
                queue: Vec::new(),
                consumer: None,
                ctx: None,
            }),
            on_close: Mutex::new(None),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            sends_posted: AtomicU64::new(0),
            receives_posted: AtomicU64::new(0),
            completion_callbacks: AtomicU64::new(0),
        })
    }

    /// Create a connection and initiate an outbound connect through
    /// `connector`. On success the connection transitions to open,
    /// `on_established` fires, and any slices enqueued in the meantime
    /// start draining. On failure `on_failed` fires and the connection
    /// stays unbound.
    pub fn connect(
        runtime: &Arc<Runtime>,
        connector: &dyn Connector,
        remote: SocketAddr,
        on_established: impl FnOnce(&Arc<TcpConnection>) + Send + 'static,
        on_failed: impl FnOnce(&Arc<TcpConnection>, io::Error) + Send + 'static,
        verbose: bool,
    ) -> Arc<TcpConnection> {
        let conn = Self::unbound(runtime.clone(), remote, verbose);

        let on_success = {
            let conn = conn.clone();
            Box::new(move |socket: Arc<TcpSocket>| {
                conn.init_socket(socket);
                on_established(&conn);
                conn.try_send();
            })
        };
        let on_failure = {
            let conn = conn.clone();
            Box::new(move |error: io::Error| {
                tracing::debug!(id = conn.id, remote = %conn.remote, %error, "connect failed");
                on_failed(&conn, error);
            })
        };
        connector.init_connect(remote, on_success, on_failure);
        conn
    }

    /// Adopt an already-accepted stream; transitions to open immediately.
    pub fn from_accepted(
        runtime: &Arc<Runtime>,
        remote: SocketAddr,
        stream: std::net::TcpStream,
        verbose: bool,
    ) -> io::Result<Arc<TcpConnection>> {
        let socket = TcpSocket::from_std(runtime.reactor(), stream, remote)?;
        let conn = Self::unbound(runtime.clone(), remote, verbose);
        conn.init_socket(socket);
        Ok(conn)
    }

    /// Connection id for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The remote endpoint this connection was built for.
    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote
    }

    /// Local address, while the socket is alive.
    pub fn local_endpoint(&self) -> Option<SocketAddr> {
        let socket = self.send.lock().socket.clone();
        socket.and_then(|s| s.local_addr().ok())
    }

    /// Number of slices waiting in the send queue. Advisory.
    pub fn send_queue_size(&self) -> usize {
        self.send.lock().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Counters snapshot. Advisory; frozen after close.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            sends_posted: self.sends_posted.load(Ordering::Relaxed),
            receives_posted: self.receives_posted.load(Ordering::Relaxed),
            completion_callbacks: self.completion_callbacks.load(Ordering::Relaxed),
        }
    }

    /// Register the close listener.
    ///
    /// Fires exactly once. If the connection already closed, the
    /// listener is invoked immediately with the recorded reason.
    pub fn on_close(&self, callback: CloseCallback) {
        {
            let mut slot = self.on_close.lock();
            *slot = Some(callback);
        }
        // A close that raced past before the store above never saw the
        // slot filled; deliver ourselves if a reason is already
        // recorded. Whoever takes the slot first makes the single call.
        let reason = *self.close_reason.lock();
        if let Some(reason) = reason {
            let callback = self.on_close.lock().take();
            if let Some(callback) = callback {
                if let Some(this) = self.this.upgrade() {
                    callback(&this, reason);
                }
            }
        }
    }

    /// Queue `slices` for transmission and kick the drainer.
    ///
    /// Slices from one call are contiguous on the wire, in call order
    /// relative to every other producer. Silently dropped once the
    /// connection closed.
    pub fn enqueue_send<I>(&self, slices: I)
    where
        I: IntoIterator<Item = Bytes>,
    {
        if self.is_closed() {
            return;
        }
        let mut scheduled = 0usize;
        let mut count = 0usize;
        {
            let mut send = self.send.lock();
            for slice in slices {
                scheduled += slice.len();
                count += 1;
                send.queue.push_back(slice);
            }
        }
        if count == 0 {
            return;
        }
        self.runtime.monitor().send_scheduled(scheduled);
        self.try_send();
    }

    /// Register the single receive consumer.
    ///
    /// Fails if one is already registered; the connection stays
    /// functional. The consumer is invoked once with the batch of ranges
    /// queued at dispatch time and must re-register (typically from
    /// within its own invocation) to keep receiving.
    pub fn receive_async(&self, callback: ReceiveCallback) -> Result<(), Error> {
        {
            let mut recv = self.recv.lock();
            if recv.consumer.is_some() {
                return Err(Error::ReceiveCallbackAlreadySet);
            }
            recv.consumer = Some(callback);
        }
        self.try_dispatch();
        Ok(())
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.close_internal(CloseReason::Requested);
    }

    /// Transition unbound → open: configure the socket, acquire both
    /// operation contexts, wire the completion listeners and arm the
    /// first receive.
    pub(crate) fn init_socket(&self, socket: Arc<TcpSocket>) {
        if socket.set_nodelay().is_err() {
            // The socket died between accept/connect and here.
            self.close_internal(CloseReason::Error(io::ErrorKind::NotConnected));
            return;
        }

        let contexts = self.runtime.contexts();
        let (send_ctx, recv_ctx) = match (contexts.acquire(), contexts.acquire()) {
            (Ok(send_ctx), Ok(recv_ctx)) => (send_ctx, recv_ctx),
            (first, second) => {
                for ctx in [first, second].into_iter().flatten() {
                    contexts.release(ctx);
                }
                tracing::error!(id = self.id, error = %Error::ContextPoolExhausted, "cannot open connection");
                self.close_internal(CloseReason::Error(io::ErrorKind::OutOfMemory));
                return;
            }
        };

        let send_listener: CompletionListener = {
            let conn = self.this.clone();
            Arc::new(move |outcome: OpOutcome| {
                if let Some(conn) = conn.upgrade() {
                    conn.on_send_completed(outcome);
                }
            })
        };
        let recv_listener: CompletionListener = {
            let conn = self.this.clone();
            Arc::new(move |outcome: OpOutcome| {
                if let Some(conn) = conn.upgrade() {
                    conn.on_receive_completed(outcome);
                }
            })
        };
        send_ctx.set_socket(socket.clone());
        send_ctx.set_listener(send_listener);
        recv_ctx.set_socket(socket.clone());
        recv_ctx.set_listener(recv_listener);

        {
            let mut send = self.send.lock();
            if self.closed.load(Ordering::Acquire) {
                // Raced with an early close; nothing was published.
                drop(send);
                socket.dispose(self.close_timeout());
                contexts.release(send_ctx);
                contexts.release(recv_ctx);
                return;
            }
            send.socket = Some(socket.clone());
            send.ctx = Some(send_ctx);
        }
        self.recv.lock().ctx = Some(recv_ctx);

        metrics::CONNECTIONS_OPENED.increment();
        metrics::CONNECTIONS_ACTIVE.add(1);
        tracing::debug!(id = self.id, remote = %self.remote, "connection open");

        self.receive_loop();
        self.try_send();
    }

    fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.runtime.config().socket_close_timeout_ms)
    }

    // ── Outbound coalescing engine ──────────────────────────────────────

    /// Drain the send queue. At most one drain runs at a time, guarded
    /// by `in_flight` under the send lock; synchronous completions
    /// re-enter as loop iterations rather than recursion.
    fn try_send(&self) {
        loop {
            {
                let mut send = self.send.lock();
                if send.in_flight || send.queue.is_empty() || send.socket.is_none() {
                    return;
                }
                if self.runtime.monitor().is_send_blocked() {
                    metrics::SEND_BLOCKED_DEFERRALS.increment();
                    return;
                }
                send.in_flight = true;
            }

            // Assemble one packet, dequeuing a slice at a time. The
            // ceiling is soft: the slice that crosses it still ships.
            let max_packet = self.runtime.config().max_send_packet_size;
            let mut staging = {
                let mut send = self.send.lock();
                send.staging.take()
            }
            .unwrap_or_else(|| BytesMut::with_capacity(max_packet));
            staging.clear();
            loop {
                let slice = {
                    let mut send = self.send.lock();
                    if staging.len() >= max_packet {
                        None
                    } else {
                        send.queue.pop_front()
                    }
                };
                match slice {
                    Some(slice) => staging.extend_from_slice(&slice),
                    None => break,
                }
            }

            if staging.is_empty() {
                // Another path drained the queue first.
                let mut send = self.send.lock();
                send.staging = Some(staging);
                send.in_flight = false;
                return;
            }
            let packet_len = staging.len();
            let packet = staging.freeze();

            let (socket, ctx) = {
                let mut send = self.send.lock();
                match (send.socket.clone(), send.ctx.clone()) {
                    (Some(socket), Some(ctx)) => (socket, ctx),
                    _ => {
                        // Closed mid-drain: the dequeued slices are
                        // dropped and the send context is ours to return.
                        // `in_flight` stays set so no further drain runs.
                        let ctx = send.ctx.take();
                        drop(send);
                        if let Some(ctx) = ctx {
                            self.runtime.contexts().release(ctx);
                        }
                        return;
                    }
                }
            };

            ctx.bind_buffer(OpBuffer::Send(packet));
            self.sends_posted.fetch_add(1, Ordering::Relaxed);
            self.runtime.monitor().send_starting(packet_len);

            match socket.start_send(&ctx) {
                Err(_) => {
                    // Disposed at post time: unbind, return the context,
                    // halt further drains.
                    let _ = ctx.take_buffer();
                    let ctx = self.send.lock().ctx.take();
                    if let Some(ctx) = ctx {
                        self.runtime.contexts().release(ctx);
                    }
                    return;
                }
                Ok(Some(outcome)) => {
                    if !self.process_send(outcome) {
                        return;
                    }
                }
                Ok(None) => return,
            }
        }
    }

    /// Async send completion, delivered through the context listener.
    fn on_send_completed(&self, outcome: OpOutcome) {
        if self.process_send(outcome) {
            self.try_send();
        }
    }

    /// Handle one send completion. Returns whether the drain may
    /// re-enter.
    fn process_send(&self, outcome: OpOutcome) -> bool {
        self.completion_callbacks.fetch_add(1, Ordering::Relaxed);

        let ctx = self.send.lock().ctx.clone();
        let packet = ctx.as_ref().and_then(|ctx| ctx.take_buffer());

        match outcome.result {
            Err(e) => {
                self.runtime.monitor().send_completed(0);
                // The context is ours: close (below) sees `in_flight`
                // still set and will not touch it.
                let ctx = self.send.lock().ctx.take();
                if let Some(ctx) = ctx {
                    self.runtime.contexts().release(ctx);
                }
                tracing::debug!(id = self.id, error = %e, "send failed");
                self.close_internal(CloseReason::Error(e.kind()));
                false
            }
            Ok(n) => {
                self.runtime.monitor().send_completed(n);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);

                // Reclaim the staging allocation once the in-flight
                // reference is gone.
                if let Some(OpBuffer::Send(bytes)) = packet {
                    if let Ok(mut staging) = bytes.try_into_mut() {
                        staging.clear();
                        self.send.lock().staging = Some(staging);
                    }
                }

                let ctx_to_return = {
                    let mut send = self.send.lock();
                    if send.socket.is_none() {
                        // Close ran during the flight and left the
                        // context for us. Keep `in_flight` set so the
                        // close path cannot also take it.
                        send.ctx.take()
                    } else {
                        send.in_flight = false;
                        None
                    }
                };
                match ctx_to_return {
                    Some(ctx) => {
                        self.runtime.contexts().release(ctx);
                        false
                    }
                    None => true,
                }
            }
        }
    }

    // ── Inbound dispatch engine ─────────────────────────────────────────

    /// Arm receives until one parks on the socket, then dispatch
    /// whatever accumulated. Synchronous completions are loop
    /// iterations.
    fn receive_loop(&self) {
        loop {
            let chunk = match self.runtime.buffers().check_out() {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!(id = self.id, error = %e, "receive buffer checkout failed");
                    self.receive_cleanup();
                    self.close_internal(CloseReason::Error(io::ErrorKind::OutOfMemory));
                    break;
                }
            };
            debug_assert_eq!(
                chunk.len(),
                self.runtime.buffers().chunk_size(),
                "pool handed out a partial chunk"
            );

            let ctx = self.recv.lock().ctx.clone();
            let Some(ctx) = ctx else {
                // Already closed and cleaned up.
                self.runtime.buffers().check_in(chunk);
                break;
            };
            let Some(socket) = ctx.socket() else {
                self.runtime.buffers().check_in(chunk);
                break;
            };

            // Bind and post in one critical section on the context, so
            // a teardown cannot slip in between.
            let armed = ctx.bind_recv_and(chunk, |chunk| {
                self.receives_posted.fetch_add(1, Ordering::Relaxed);
                self.runtime.monitor().receive_starting();
                socket.start_recv(&ctx, chunk)
            });

            match armed {
                Err(_) => {
                    // Disposed at post time: locally return chunk and
                    // context.
                    self.receive_cleanup();
                    break;
                }
                Ok(Some(outcome)) => {
                    if !self.process_receive(outcome) {
                        break;
                    }
                }
                Ok(None) => break,
            }
        }
        self.try_dispatch();
    }

    /// Async receive completion, delivered through the context listener.
    fn on_receive_completed(&self, outcome: OpOutcome) {
        if self.process_receive(outcome) {
            self.receive_loop();
        }
    }

    /// Handle one receive completion. Returns whether the loop should
    /// re-arm.
    fn process_receive(&self, outcome: OpOutcome) -> bool {
        self.completion_callbacks.fetch_add(1, Ordering::Relaxed);

        match outcome.result {
            Ok(0) => {
                // Zero transfer is always a normal peer close.
                self.runtime.monitor().receive_completed(0);
                self.receive_cleanup();
                self.close_internal(CloseReason::PeerClosed);
                false
            }
            Err(e) => {
                self.runtime.monitor().receive_completed(0);
                self.receive_cleanup();
                tracing::debug!(id = self.id, error = %e, "receive failed");
                self.close_internal(CloseReason::Error(e.kind()));
                false
            }
            Ok(n) => {
                self.runtime.monitor().receive_completed(n);
                self.packets_received.fetch_add(1, Ordering::Relaxed);
                self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);

                let ctx = self.recv.lock().ctx.clone();
                let Some(ctx) = ctx else {
                    return false;
                };
                // Detach the chunk so the next arm can bind. The range
                // keeps the whole chunk; only the prefix is exposed.
                let Some(OpBuffer::Recv(chunk)) = ctx.take_buffer() else {
                    debug_assert!(false, "receive completed without a bound chunk");
                    return false;
                };
                debug_assert!(n <= chunk.len(), "receive filled past the loaned chunk");
                self.recv.lock().queue.push(RecvChunk { chunk, len: n });
                true
            }
        }
    }

    /// Hand the queued batch to the consumer, then release every chunk.
    fn try_dispatch(&self) {
        let taken = {
            let mut recv = self.recv.lock();
            if recv.queue.is_empty() {
                None
            } else {
                recv.consumer
                    .take()
                    .map(|consumer| (std::mem::take(&mut recv.queue), consumer))
            }
        };
        let Some((batch, consumer)) = taken else {
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };

        // Consumer runs outside all locks; it may re-register and
        // enqueue sends synchronously.
        consumer(&this, &batch);

        // Release actions: every chunk goes back whole.
        let mut total = 0usize;
        let buffers = self.runtime.buffers();
        for range in batch {
            total += range.len();
            buffers.check_in(range.into_chunk());
        }
        self.runtime.monitor().receive_dispatched(total);
    }

    /// Receive-side error cleanup: return the receive context, check any
    /// bound chunk back in, drop undelivered ranges and clear the
    /// consumer slot. Close itself never touches the receive context —
    /// only this path does, so an in-flight receive callback can never
    /// race a close into a double release.
    fn receive_cleanup(&self) {
        let (ctx, queued, _consumer) = {
            let mut recv = self.recv.lock();
            (
                recv.ctx.take(),
                std::mem::take(&mut recv.queue),
                recv.consumer.take(),
            )
        };
        let buffers = self.runtime.buffers();
        if let Some(ctx) = ctx {
            if let Some(OpBuffer::Recv(chunk)) = ctx.take_buffer() {
                buffers.check_in(chunk);
            }
            self.runtime.contexts().release(ctx);
        }
        for range in queued {
            buffers.check_in(range.into_chunk());
        }
    }

    // ── Close protocol ──────────────────────────────────────────────────

    /// Single-shot close. The first caller wins; everyone else returns.
    fn close_internal(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.close_reason.lock() = Some(reason);

        self.runtime.monitor().closed();
        metrics::CONNECTIONS_ACTIVE.sub(1);

        if self.verbose {
            let stats = self.stats();
            tracing::info!(
                id = self.id,
                remote = %self.remote,
                ?reason,
                packets_sent = stats.packets_sent,
                packets_received = stats.packets_received,
                bytes_sent = stats.bytes_sent,
                bytes_received = stats.bytes_received,
                sends_posted = stats.sends_posted,
                receives_posted = stats.receives_posted,
                completion_callbacks = stats.completion_callbacks,
                "connection closed"
            );
        } else {
            tracing::debug!(id = self.id, remote = %self.remote, ?reason, "connection closed");
        }

        // Clear the socket handle exactly once and tear it down.
        // Disposing fails any parked operation, which runs the
        // send/receive completion paths (and their cleanup) inline.
        let socket = self.send.lock().socket.take();
        if let Some(socket) = socket {
            socket.dispose(self.close_timeout());
        }

        // The send context is ours only when no send is in flight; an
        // in-flight completion returns it otherwise. The receive context
        // is never touched here — see `receive_cleanup`.
        let ctx = {
            let mut send = self.send.lock();
            if send.in_flight {
                None
            } else {
                send.ctx.take()
            }
        };
        if let Some(ctx) = ctx {
            self.runtime.contexts().release(ctx);
        }

        let callback = self.on_close.lock().take();
        if let Some(callback) = callback {
            if let Some(this) = self.this.upgrade() {
                callback(&this, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_classification() {
        assert!(!CloseReason::PeerClosed.is_error());
        assert!(!CloseReason::Requested.is_error());
        assert!(CloseReason::Error(io::ErrorKind::ConnectionReset).is_error());
    }

    #[test]
    fn test_recv_chunk_exposes_prefix_only() {
        let mut chunk = BytesMut::zeroed(8);
        chunk[..3].copy_from_slice(b"abc");
        let range = RecvChunk { chunk, len: 3 };
        assert_eq!(range.as_slice(), b"abc");
        assert_eq!(range.len(), 3);
        assert!(!range.is_empty());
        // Releasing recovers the full chunk.
        assert_eq!(range.into_chunk().len(), 8);
    }
}
