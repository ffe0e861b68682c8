//! Outbound connection establishment.

use crate::reactor::Reactor;
use crate::socket::TcpSocket;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// Success callback: the connected socket.
pub type ConnectSuccess = Box<dyn FnOnce(Arc<TcpSocket>) + Send>;
/// Failure callback: the socket error that ended the attempt.
pub type ConnectFailure = Box<dyn FnOnce(io::Error) + Send>;

/// Resolves a remote endpoint to a connected socket.
///
/// Exactly one of the two callbacks fires per `init_connect` call.
pub trait Connector: Send + Sync {
    fn init_connect(&self, remote: SocketAddr, on_success: ConnectSuccess, on_failure: ConnectFailure);
}

/// Reactor-backed connector: a nonblocking TCP connect completed by the
/// poll thread.
pub struct TcpConnector {
    reactor: Arc<Reactor>,
}

impl TcpConnector {
    pub fn new(reactor: Arc<Reactor>) -> Self {
        Self { reactor }
    }
}

impl Connector for TcpConnector {
    fn init_connect(
        &self,
        remote: SocketAddr,
        on_success: ConnectSuccess,
        on_failure: ConnectFailure,
    ) {
        TcpSocket::connect(
            &self.reactor,
            remote,
            Box::new(move |result| match result {
                Ok(socket) => on_success(socket),
                Err(e) => on_failure(e),
            }),
        );
    }
}
