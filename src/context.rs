//! Reusable socket operation contexts.
//!
//! An [`OpContext`] bundles everything one pending socket operation
//! needs: the buffer being sent or received, the socket the operation
//! targets and the completion listener to run when it finishes. Contexts
//! are pooled so a connection never allocates per operation: each open
//! connection holds exactly two, one per direction.
//!
//! Returning a context to the [`OpContextPool`] detaches its listener
//! and clears its socket reference, so a parked context never extends
//! the lifetime of a socket or a connection.

use crate::error::Error;
use crate::socket::{OpOutcome, TcpSocket};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;

/// Listener invoked once per completed operation. Wired when a
/// connection opens and detached when the context returns to the pool.
pub type CompletionListener = Arc<dyn Fn(OpOutcome) + Send + Sync>;

/// The buffer bound to a pending operation.
pub enum OpBuffer {
    /// Coalesced outbound packet staged for one send.
    Send(Bytes),
    /// Pool chunk armed for one receive.
    Recv(BytesMut),
}

#[derive(Default)]
struct OpInner {
    socket: Option<Arc<TcpSocket>>,
    buffer: Option<OpBuffer>,
    listener: Option<CompletionListener>,
}

/// A reusable descriptor for one pending socket operation.
///
/// The internal lock is the binding lock the engines rely on: a receive
/// is bound and posted inside one critical section on it
/// ([`bind_recv_and`](Self::bind_recv_and)), and the socket reads or
/// writes an already-bound buffer under the same lock, so an arm can
/// never race a teardown.
pub struct OpContext {
    inner: Mutex<OpInner>,
}

impl OpContext {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(OpInner::default()),
        })
    }

    /// Attach the socket this context will operate on.
    pub fn set_socket(&self, socket: Arc<TcpSocket>) {
        self.inner.lock().socket = Some(socket);
    }

    /// The attached socket, if any.
    pub fn socket(&self) -> Option<Arc<TcpSocket>> {
        self.inner.lock().socket.clone()
    }

    /// Wire the completion listener.
    pub fn set_listener(&self, listener: CompletionListener) {
        self.inner.lock().listener = Some(listener);
    }

    /// Bind a buffer for the next operation.
    pub fn bind_buffer(&self, buffer: OpBuffer) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.buffer.is_none(), "operation buffer already bound");
        inner.buffer = Some(buffer);
    }

    /// Bind a receive chunk and run `post` on it in the same critical
    /// section, so a teardown cannot slip between the bind and the post.
    pub(crate) fn bind_recv_and<R>(
        &self,
        chunk: BytesMut,
        post: impl FnOnce(&mut BytesMut) -> R,
    ) -> R {
        let mut inner = self.inner.lock();
        debug_assert!(inner.buffer.is_none(), "operation buffer already bound");
        match inner.buffer.insert(OpBuffer::Recv(chunk)) {
            OpBuffer::Recv(chunk) => post(chunk),
            OpBuffer::Send(_) => unreachable!(),
        }
    }

    /// Detach and take the bound buffer.
    pub fn take_buffer(&self) -> Option<OpBuffer> {
        self.inner.lock().buffer.take()
    }

    /// Run `f` on the bound send packet, under the binding lock.
    /// Returns `None` when no send buffer is bound.
    pub(crate) fn with_send_buffer<R>(&self, f: impl FnOnce(&Bytes) -> R) -> Option<R> {
        let inner = self.inner.lock();
        match inner.buffer.as_ref() {
            Some(OpBuffer::Send(packet)) => Some(f(packet)),
            _ => None,
        }
    }

    /// Run `f` on the bound receive chunk, under the binding lock.
    /// Returns `None` when no receive buffer is bound.
    pub(crate) fn with_recv_buffer<R>(&self, f: impl FnOnce(&mut BytesMut) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        match inner.buffer.as_mut() {
            Some(OpBuffer::Recv(chunk)) => Some(f(chunk)),
            _ => None,
        }
    }

    /// Invoke the completion listener with `outcome`.
    ///
    /// The listener is looked up under the binding lock but always
    /// invoked outside it. A context without a listener (already
    /// returned to the pool) ignores the completion.
    pub fn complete(&self, outcome: OpOutcome) {
        let listener = self.inner.lock().listener.clone();
        if let Some(listener) = listener {
            listener(outcome);
        }
    }

    /// Reset for pooling: detach the listener, drop the socket reference.
    fn clear(&self) {
        let mut inner = self.inner.lock();
        debug_assert!(
            inner.buffer.is_none(),
            "context returned with a buffer still bound"
        );
        inner.socket = None;
        inner.listener = None;
        inner.buffer = None;
    }
}

/// A fixed pool of operation contexts.
pub struct OpContextPool {
    free: Mutex<Vec<Arc<OpContext>>>,
    capacity: usize,
}

impl OpContextPool {
    /// Create a pool holding `capacity` contexts.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| OpContext::new()).collect();
        Self {
            free: Mutex::new(free),
            capacity,
        }
    }

    /// Take a cleared context.
    pub fn acquire(&self) -> Result<Arc<OpContext>, Error> {
        self.free.lock().pop().ok_or(Error::ContextPoolExhausted)
    }

    /// Return a context. All slots are cleared before it is stored.
    pub fn release(&self, ctx: Arc<OpContext>) {
        ctx.clear();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(ctx);
        }
    }

    /// Number of contexts currently available.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total number of contexts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_acquire_and_release() {
        let pool = OpContextPool::new(2);
        assert_eq!(pool.available(), 2);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.available(), 0);
        assert!(matches!(pool.acquire(), Err(Error::ContextPoolExhausted)));

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_release_detaches_listener() {
        let pool = OpContextPool::new(1);
        let fired = Arc::new(AtomicUsize::new(0));

        let ctx = pool.acquire().unwrap();
        let counter = fired.clone();
        ctx.set_listener(Arc::new(move |_outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        ctx.complete(OpOutcome { result: Ok(1) });
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        pool.release(ctx);
        let ctx = pool.acquire().unwrap();
        // The listener did not survive pooling.
        ctx.complete(OpOutcome { result: Ok(1) });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        pool.release(ctx);
    }

    #[test]
    fn test_bind_recv_posts_with_chunk_bound() {
        let pool = OpContextPool::new(1);
        let ctx = pool.acquire().unwrap();

        let mut chunk = BytesMut::zeroed(8);
        chunk[..2].copy_from_slice(b"hi");
        let seen = ctx.bind_recv_and(chunk, |chunk| chunk.len());
        assert_eq!(seen, 8);

        // The chunk stays bound after the post returns.
        match ctx.take_buffer() {
            Some(OpBuffer::Recv(chunk)) => assert_eq!(&chunk[..2], b"hi"),
            _ => panic!("expected the bound receive chunk"),
        }
        pool.release(ctx);
    }

    #[test]
    fn test_buffer_binding_round_trip() {
        let pool = OpContextPool::new(1);
        let ctx = pool.acquire().unwrap();

        ctx.bind_buffer(OpBuffer::Send(Bytes::from_static(b"abc")));
        let seen = ctx.with_send_buffer(|packet| packet.len());
        assert_eq!(seen, Some(3));

        match ctx.take_buffer() {
            Some(OpBuffer::Send(packet)) => assert_eq!(&packet[..], b"abc"),
            _ => panic!("expected the bound send packet"),
        }
        assert!(ctx.take_buffer().is_none());
        pool.release(ctx);
    }
}
