//! Send-blocked throttling through the monitor.

mod common;

use byteline::{Runtime, StatsMonitor};
use bytes::Bytes;
use common::{collect_into, test_config, wait_until};
use parking_lot::Mutex;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_send_blocked_defers_drain_until_next_enqueue() {
    let monitor = Arc::new(StatsMonitor::new());
    let runtime = Runtime::with_monitor(test_config(), monitor.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();
    let client_stream = TcpStream::connect(server_addr).unwrap();
    let (server_stream, client_addr) = listener.accept().unwrap();
    let a = byteline::TcpConnection::from_accepted(&runtime, server_addr, client_stream, false)
        .unwrap();
    let b = byteline::TcpConnection::from_accepted(&runtime, client_addr, server_stream, false)
        .unwrap();

    let sink = Arc::new(Mutex::new(Vec::new()));
    collect_into(&b, sink.clone());

    // While the monitor reports send-blocked, slices queue but no packet
    // is posted.
    monitor.set_send_blocked(true);
    let slices: Vec<Bytes> = (0..10u8).map(|i| Bytes::from(vec![i; 100])).collect();
    a.enqueue_send(slices);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(a.stats().sends_posted, 0);
    assert_eq!(a.stats().packets_sent, 0);
    assert_eq!(a.send_queue_size(), 10);
    assert!(sink.lock().is_empty());

    // Unblocking takes effect on the next enqueue.
    monitor.set_send_blocked(false);
    a.enqueue_send([Bytes::from(vec![10u8; 100])]);

    wait_until(|| sink.lock().len() == 11 * 100, "all eleven slices to flush");
    let sink = sink.lock();
    for i in 0..11usize {
        assert!(
            sink[i * 100..(i + 1) * 100].iter().all(|&b| b == i as u8),
            "slice {i} out of order"
        );
    }

    a.close();
    b.close();
}
