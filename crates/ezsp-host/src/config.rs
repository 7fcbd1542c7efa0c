use std::time::Duration;

use ezsp_ash::AshConfig;
use ezsp_transport::SerialOptions;

/// Protocol version assumed before negotiation.
pub const DEFAULT_PROTOCOL_VERSION: u8 = 8;

/// Default per-command response timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Host-side configuration, including the layers below.
#[derive(Debug, Clone)]
pub struct EzspConfig {
    /// Frame format used until the NCP reports its version.
    pub initial_version: u8,
    /// Timeout for `execute` and `waiter` when none is given.
    pub command_timeout: Duration,
    /// Interval between watchdog `nop`s; `None` disables the watchdog.
    pub watchdog_period: Option<Duration>,
    /// Consecutive watchdog failures tolerated before a reset event.
    pub max_watchdog_failures: u32,
    /// Connection attempts made by [`connect`](crate::connect).
    pub connect_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n` times this.
    pub connect_retry_delay: Duration,
    pub serial: SerialOptions,
    pub ash: AshConfig,
}

impl Default for EzspConfig {
    fn default() -> Self {
        Self {
            initial_version: DEFAULT_PROTOCOL_VERSION,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            watchdog_period: Some(Duration::from_secs(10)),
            max_watchdog_failures: 4,
            connect_attempts: 4,
            connect_retry_delay: Duration::from_secs(5),
            serial: SerialOptions::default(),
            ash: AshConfig::default(),
        }
    }
}
