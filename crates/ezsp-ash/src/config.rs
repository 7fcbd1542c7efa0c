use std::time::Duration;

use crate::frame::MAX_DATA_FIELD;

/// Default number of unacknowledged DATA frames in flight.
pub const DEFAULT_TX_WINDOW: u8 = 3;
/// Default initial acknowledgement timeout.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(800);
/// Default retransmissions before the link is declared failed.
pub const DEFAULT_MAX_RETRANSMITS: u8 = 6;
/// Default time to wait for RSTACK after sending RST.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(2500);

/// ASH link tuning.
#[derive(Debug, Clone)]
pub struct AshConfig {
    /// Maximum DATA frames awaiting acknowledgement (1..=7).
    pub tx_window: u8,
    /// Acknowledgement timeout for a first transmission.
    pub ack_timeout_init: Duration,
    /// Lower bound for the backed-off acknowledgement timeout.
    pub ack_timeout_min: Duration,
    /// Upper bound for the backed-off acknowledgement timeout.
    pub ack_timeout_max: Duration,
    /// Retransmissions of one frame before the link fails.
    pub max_retransmits: u8,
    /// Time to wait for RSTACK after RST.
    pub reset_timeout: Duration,
    /// Largest EZSP frame accepted by [`send`](crate::AshLink::send).
    pub max_payload: usize,
    /// XOR DATA payloads with the LFSR sequence.
    pub randomize: bool,
}

impl Default for AshConfig {
    fn default() -> Self {
        Self {
            tx_window: DEFAULT_TX_WINDOW,
            ack_timeout_init: DEFAULT_ACK_TIMEOUT,
            ack_timeout_min: Duration::from_millis(400),
            ack_timeout_max: Duration::from_millis(2400),
            max_retransmits: DEFAULT_MAX_RETRANSMITS,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            max_payload: MAX_DATA_FIELD,
            randomize: true,
        }
    }
}

impl AshConfig {
    /// Acknowledgement timeout after `retries` retransmissions: the initial
    /// timeout doubled per retry, clamped to the configured bounds.
    pub fn ack_timeout_for(&self, retries: u8) -> Duration {
        let factor = 1u32 << u32::from(retries.min(16));
        self.ack_timeout_init
            .saturating_mul(factor)
            .max(self.ack_timeout_min)
            .min(self.ack_timeout_max)
    }

    /// Window size limited to what 3-bit frame numbers can express.
    pub(crate) fn window(&self) -> usize {
        usize::from(self.tx_window.clamp(1, 7))
    }
}
