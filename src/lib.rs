//! byteline - asynchronous bidirectional TCP connection core.
//!
//! A connection core that sits between a raw socket and a framed
//! protocol layer. It owns the lifecycle of one connected socket,
//! coalesces many small outbound writes into fewer large packets,
//! recycles fixed-size receive buffers through a shared pool, and
//! delivers received byte ranges to a single consumer callback while
//! rigorously ordering concurrent send, receive and close events.
//!
//! # Quick Start
//!
//! ```ignore
//! use byteline::{Config, Runtime, TcpConnection};
//! use bytes::Bytes;
//!
//! let runtime = Runtime::new(Config::default())?;
//!
//! // Server side: adopt an accepted stream.
//! let (stream, peer) = listener.accept()?;
//! let conn = TcpConnection::from_accepted(&runtime, peer, stream, false)?;
//!
//! conn.on_close(Box::new(|conn, reason| {
//!     println!("{} closed: {:?}", conn.remote_endpoint(), reason);
//! }));
//!
//! // Echo everything back, re-registering from within the consumer.
//! fn pump(conn: &std::sync::Arc<TcpConnection>) {
//!     conn.receive_async(Box::new(|conn, ranges| {
//!         let slices: Vec<Bytes> = ranges
//!             .iter()
//!             .map(|r| Bytes::copy_from_slice(r.as_slice()))
//!             .collect();
//!         conn.enqueue_send(slices);
//!         pump(conn);
//!     }))
//!     .ok();
//! }
//! pump(&conn);
//! ```
//!
//! # Guarantees
//!
//! - Bytes leave the socket in `enqueue_send` order; slices from one
//!   call are contiguous on the wire.
//! - Received ranges reach the consumer in reception order, without
//!   duplicates or gaps, until close.
//! - The close listener fires exactly once, whether the close came from
//!   an OS error, a peer close or an explicit `close()`.
//! - Every pool buffer checked out for a receive is checked back in
//!   whole by the time the close listener has run; both operation
//!   contexts are back in their pool after close.
//! - No user callback is invoked while a connection lock is held.

mod buffer_pool;
mod config;
mod connection;
mod connector;
mod context;
mod error;
pub mod metrics;
mod monitor;
mod reactor;
mod runtime;
mod socket;

pub use buffer_pool::BufferPool;
pub use config::Config;
pub use connection::{
    CloseCallback, CloseReason, ConnectionStats, ReceiveCallback, RecvChunk, TcpConnection,
};
pub use connector::{ConnectFailure, ConnectSuccess, Connector, TcpConnector};
pub use context::{CompletionListener, OpBuffer, OpContext, OpContextPool};
pub use error::Error;
pub use monitor::{ConnectionMonitor, StatsMonitor};
pub use reactor::Reactor;
pub use runtime::Runtime;
pub use socket::{ConnectCallback, OpOutcome, TcpSocket};
