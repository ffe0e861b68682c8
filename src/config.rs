use serde::{Deserialize, Serialize};

/// Configuration for the connection core.
///
/// All sizes are fixed at construction; the pools never grow. Exhaustion
/// of either pool is surfaced as an error on the affected connection, not
/// a stall.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of chunks in the shared byte buffer pool.
    pub buffer_chunks_count: usize,
    /// Size of each pool chunk in bytes. Every receive is armed with one
    /// full chunk.
    pub socket_buffer_size: usize,
    /// Number of reusable socket operation contexts in the shared pool.
    /// Each open connection holds two: one send, one receive.
    pub send_receive_pool_size: usize,
    /// Lingering close timeout in milliseconds applied when a socket is
    /// torn down.
    pub socket_close_timeout_ms: u64,
    /// Coalescing ceiling for one outbound packet. Soft bound: a packet
    /// may exceed it by at most one queued slice.
    pub max_send_packet_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_chunks_count: 512,
            socket_buffer_size: 8192,
            send_receive_pool_size: 512,
            socket_close_timeout_ms: 500,
            max_send_packet_size: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.buffer_chunks_count, 512);
        assert_eq!(config.socket_buffer_size, 8192);
        assert_eq!(config.send_receive_pool_size, 512);
        assert_eq!(config.socket_close_timeout_ms, 500);
        assert_eq!(config.max_send_packet_size, 65536);
    }
}
