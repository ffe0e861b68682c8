//! Shared helpers for the integration tests.
#![allow(dead_code)]

use byteline::{Config, Runtime, TcpConnection};
use parking_lot::Mutex;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Small pools so accounting mistakes surface quickly.
pub fn test_config() -> Config {
    Config {
        buffer_chunks_count: 64,
        socket_buffer_size: 8192,
        send_receive_pool_size: 16,
        socket_close_timeout_ms: 100,
        max_send_packet_size: 64 * 1024,
    }
}

pub fn runtime() -> Arc<Runtime> {
    Runtime::new(test_config()).unwrap()
}

pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Poll `cond` until it holds or the deadline passes.
pub fn wait_until(cond: impl Fn() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// A connected pair of connections over localhost.
pub fn pair(runtime: &Arc<Runtime>) -> (Arc<TcpConnection>, Arc<TcpConnection>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();
    let client_stream = TcpStream::connect(server_addr).unwrap();
    let (server_stream, client_addr) = listener.accept().unwrap();

    let client = TcpConnection::from_accepted(runtime, server_addr, client_stream, false).unwrap();
    let server = TcpConnection::from_accepted(runtime, client_addr, server_stream, false).unwrap();
    (client, server)
}

/// A connection on one end and a raw std stream on the other.
pub fn raw_peer(runtime: &Arc<Runtime>) -> (Arc<TcpConnection>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();
    let client_stream = TcpStream::connect(server_addr).unwrap();
    let (server_stream, _client_addr) = listener.accept().unwrap();

    let conn = TcpConnection::from_accepted(runtime, server_addr, client_stream, false).unwrap();
    (conn, server_stream)
}

/// Register a consumer that appends everything it sees to `sink` and
/// re-registers itself from within its own invocation.
pub fn collect_into(conn: &Arc<TcpConnection>, sink: Arc<Mutex<Vec<u8>>>) {
    let again = sink.clone();
    let _ = conn.receive_async(Box::new(move |conn, ranges| {
        {
            let mut sink = again.lock();
            for range in ranges {
                sink.extend_from_slice(range.as_slice());
            }
        }
        collect_into(conn, again);
    }));
}
