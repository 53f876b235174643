//! Client configuration.
//!
//! All knobs have defaults tuned for a socket-mode endpoint that pings
//! roughly every ten seconds. [`ClientBuilder`](crate::ClientBuilder)
//! exposes a fluent setter for each field.

use std::time::Duration;

/// Default backoff base delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default backoff cap.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Default upper bound (exclusive) for backoff jitter.
pub const DEFAULT_BACKOFF_JITTER: Duration = Duration::from_secs(1);

/// Default time without a liveness signal before the connection is dead.
pub const DEFAULT_DEADMAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between client-sent pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default deadline for a single transport write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for the transport handshake.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the Receiver -> Pump channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 64;

/// Default capacity of the application event stream.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Default time teardown waits for the receive loop before aborting it.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Configuration for the connection supervisor, pump and receiver.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base delay of the exponential backoff.
    pub backoff_base: Duration,
    /// Maximum backoff delay before jitter.
    pub backoff_max: Duration,
    /// Jitter is drawn from `[0, backoff_jitter)`.
    pub backoff_jitter: Duration,
    /// No liveness signal for this long tears the session down.
    pub deadman_timeout: Duration,
    /// Interval between client pings; `None` disables them.
    pub keepalive_interval: Option<Duration>,
    /// Deadline for each transport write.
    pub write_timeout: Duration,
    /// Deadline for the transport handshake.
    pub dial_timeout: Duration,
    /// Bounded channel between the receive loop and the pump.
    pub inbound_capacity: usize,
    /// Buffered application event stream.
    pub event_capacity: usize,
    /// Ask the remote to exercise reconnects (`debug_reconnects=true`).
    pub debug_reconnects: bool,
    /// Grace period for the receive loop to notice a closed transport.
    pub close_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
            deadman_timeout: DEFAULT_DEADMAN_TIMEOUT,
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            debug_reconnects: false,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}
