//! Server configuration.

use std::time::Duration;

/// Per-connection settings for the server.
///
/// The defaults keep a browser tab alive through idle stretches: a ping
/// goes out every 54 seconds, and a peer that sends nothing at all (not
/// even a pong) for 60 seconds is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to. Port `0` picks a free port.
    pub bind_addr: String,

    /// Frames that may wait in a connection's outbound queue. When
    /// full, new messages for that connection are dropped.
    pub outbound_capacity: usize,

    /// Period between pings sent by the writer.
    pub ping_interval: Duration,

    /// How long the reader waits for any frame before declaring the
    /// link dead. Must be longer than `ping_interval`.
    pub pong_timeout: Duration,

    /// Largest inbound data frame accepted. A larger one closes the link.
    pub max_frame_bytes: usize,

    /// Longest a single outbound write may take. A peer that stops
    /// reading is dropped once a write stalls past this.
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_timeout = Duration::from_secs(60);
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            outbound_capacity: 256,
            ping_interval: pong_timeout * 9 / 10,
            pong_timeout,
            max_frame_bytes: 512,
            write_timeout: Duration::from_secs(10),
        }
    }
}
