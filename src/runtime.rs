//! Shared per-process resources.

use crate::buffer_pool::BufferPool;
use crate::config::Config;
use crate::connector::TcpConnector;
use crate::context::OpContextPool;
use crate::monitor::{ConnectionMonitor, StatsMonitor};
use crate::reactor::Reactor;
use std::io;
use std::sync::Arc;

/// Everything connections borrow from: the reactor thread, the byte
/// buffer pool, the operation context pool and the monitor.
///
/// The original design uses process-wide singletons; a `Runtime` is the
/// injectable equivalent — build one per process (or one per test).
pub struct Runtime {
    config: Config,
    reactor: Arc<Reactor>,
    buffers: Arc<BufferPool>,
    contexts: Arc<OpContextPool>,
    monitor: Arc<dyn ConnectionMonitor>,
}

impl Runtime {
    /// Build a runtime with the default [`StatsMonitor`].
    pub fn new(config: Config) -> io::Result<Arc<Self>> {
        Self::with_monitor(config, Arc::new(StatsMonitor::new()))
    }

    /// Build a runtime with a caller-supplied monitor.
    pub fn with_monitor(
        config: Config,
        monitor: Arc<dyn ConnectionMonitor>,
    ) -> io::Result<Arc<Self>> {
        let reactor = Reactor::new()?;
        let buffers = Arc::new(BufferPool::new(
            config.socket_buffer_size,
            config.buffer_chunks_count,
        ));
        let contexts = Arc::new(OpContextPool::new(config.send_receive_pool_size));
        Ok(Arc::new(Self {
            config,
            reactor,
            buffers,
            contexts,
            monitor,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    pub fn contexts(&self) -> &Arc<OpContextPool> {
        &self.contexts
    }

    pub fn monitor(&self) -> &dyn ConnectionMonitor {
        &*self.monitor
    }

    /// A connector bound to this runtime's reactor.
    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(self.reactor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_builds_pools_from_config() {
        let config = Config {
            buffer_chunks_count: 8,
            socket_buffer_size: 256,
            send_receive_pool_size: 4,
            ..Config::default()
        };
        let runtime = Runtime::new(config).unwrap();
        assert_eq!(runtime.buffers().chunk_count(), 8);
        assert_eq!(runtime.buffers().chunk_size(), 256);
        assert_eq!(runtime.contexts().capacity(), 4);
        runtime.reactor().shutdown();
    }
}
