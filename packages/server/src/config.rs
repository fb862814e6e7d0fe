//! Tunable constants of the live synchronization layer.

use std::time::Duration;

/// Maximum number of viewers per event room
pub const DEFAULT_ROOM_CAPACITY: usize = 200;
/// Period of the ping/pong liveness sweep
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Delay between a room-closure decision and severing its connections
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Close code sent to every viewer when the process shuts down (Going Away)
pub const SHUTDOWN_CLOSE_CODE: u16 = 1001;
/// Close code sent when an event becomes official (Normal Closure)
pub const OFFICIAL_CLOSE_CODE: u16 = 1000;

/// Server-side synchronization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub room_capacity: usize,
    pub heartbeat_interval: Duration,
    pub close_grace: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            room_capacity: DEFAULT_ROOM_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}
