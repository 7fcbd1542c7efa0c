use std::time::Duration;

use crate::frame::ResetCode;

/// Errors raised by the ASH link layer.
#[derive(Debug, thiserror::Error)]
pub enum AshError {
    /// The payload does not fit in one DATA frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An INVALID frame kind cannot be put on the wire.
    #[error("cannot encode an invalid frame")]
    InvalidFrame,

    /// The link is not in the CONNECTED state.
    #[error("link not connected")]
    NotConnected,

    /// No RSTACK arrived after sending RST.
    #[error("NCP did not acknowledge reset within {0:?}")]
    ResetTimeout(Duration),

    /// The NCP speaks an ASH version other than 2.
    #[error("unsupported ASH version {0} (expected 2)")]
    UnsupportedVersion(u8),

    /// A DATA frame was not acknowledged after the maximum retransmissions.
    #[error("frame {frame} not acknowledged after {attempts} retransmissions")]
    RetryLimitExceeded { frame: u8, attempts: u8 },

    /// RSTACK received while the link was already connected.
    #[error("NCP reset unexpectedly: {0}")]
    UnexpectedReset(ResetCode),

    /// The NCP reported an ERROR frame and entered the failed state.
    #[error("NCP entered the failed state (version {version}): {code}")]
    NcpError { version: u8, code: ResetCode },

    /// An I/O error occurred while reading or writing the serial stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial stream reached EOF.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, AshError>;
