//! Connection core metrics.

use metriken::{metric, Counter, Gauge};

#[metric(
    name = "connections_opened",
    description = "Total connections that transitioned to open"
)]
pub static CONNECTIONS_OPENED: Counter = Counter::new();

#[metric(
    name = "connections_closed",
    description = "Total connections that transitioned to closed"
)]
pub static CONNECTIONS_CLOSED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Number of currently open connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(
    name = "send_bytes_scheduled",
    description = "Bytes appended to send queues"
)]
pub static SEND_BYTES_SCHEDULED: Counter = Counter::new();

#[metric(name = "send_packets", description = "Coalesced packets sent")]
pub static SEND_PACKETS: Counter = Counter::new();

#[metric(name = "send_bytes", description = "Bytes written to sockets")]
pub static SEND_BYTES: Counter = Counter::new();

#[metric(name = "recv_packets", description = "Completed receive operations")]
pub static RECV_PACKETS: Counter = Counter::new();

#[metric(name = "recv_bytes", description = "Bytes read from sockets")]
pub static RECV_BYTES: Counter = Counter::new();

#[metric(
    name = "recv_bytes_dispatched",
    description = "Bytes handed to receive consumers"
)]
pub static RECV_BYTES_DISPATCHED: Counter = Counter::new();

#[metric(
    name = "send_blocked_deferrals",
    description = "Drain attempts deferred because the monitor reported send-blocked"
)]
pub static SEND_BLOCKED_DEFERRALS: Counter = Counter::new();
