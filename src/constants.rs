//! Protocol-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Network
// =============================================================================

/// UDP port the device listens on for commands
pub const DEFAULT_COMMAND_PORT: u16 = 7000;

/// Base for the derived local port (base + last octet of the device IP)
pub const LOCAL_PORT_BASE: u16 = 8000;

/// UDP receive buffer size
pub const UDP_BUFFER_SIZE: usize = 4096;

/// Channel capacity for async message passing
pub const CHANNEL_CAPACITY: usize = 64;

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// Timing
// =============================================================================

/// Interval between status polls (milliseconds)
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 10_000;

/// Interval between discovery retries (milliseconds, fixed rate)
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Deadline for a single request/response exchange (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;

// =============================================================================
// Retry budgets
// =============================================================================

/// Discovery rounds before `connect` gives up
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Consecutive unanswered polls before the binding is demoted
pub const DEFAULT_MAX_MISSED_POLLS: u32 = 3;

/// Maximum socket bind retry attempts
pub const MAX_SOCKET_RETRY_ATTEMPTS: u32 = 5;

/// Delay between socket bind retry attempts (milliseconds, fixed rate)
pub const BIND_RETRY_DELAY_MS: u64 = 5_000;

// =============================================================================
// Device quirks
// =============================================================================

/// Units report the room temperature sensor offset by this amount
pub const TEMP_SENSOR_SHIFT: i64 = 40;
