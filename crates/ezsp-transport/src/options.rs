use std::time::Duration;

/// Default serial baud rate for EmberZNet NCP firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout. Blocking reads return at least this often so the
/// link layer can service its retransmission timers.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Options used when opening a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialOptions {
    /// Baud rate for serial devices. Ignored for TCP bridges.
    pub baud_rate: u32,
    /// Enable RTS/CTS hardware flow control. Ignored for TCP bridges.
    pub rtscts: bool,
    /// Read timeout applied to the opened stream.
    pub read_timeout: Duration,
    /// Connect timeout for TCP bridges.
    pub connect_timeout: Duration,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            rtscts: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}
