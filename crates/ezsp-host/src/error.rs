use std::fmt;
use std::time::Duration;

use ezsp_schema::{EzspStatus, SchemaError};

use crate::frame::{FC_CALLBACK_ASYNC, FC_CALLBACK_SYNC};

/// Why an inbound EZSP frame could not be turned into a decoded frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameFailure {
    /// Fewer bytes than the smallest frame header.
    #[error("frame too short ({len} bytes)")]
    TooShort { len: usize },

    /// The direction bit marks the frame as a command, not a response.
    #[error("wrong direction")]
    WrongDirection,

    /// The NCP truncated its response.
    #[error("response truncated by NCP")]
    Truncated,

    /// The NCP ran out of memory since the previous response.
    #[error("NCP overflow")]
    Overflow,

    /// Reserved bits of the extended frame control are set.
    #[error("unsupported frame control 0x{0:04X}")]
    UnsupportedControl(u16),

    /// No schema entry applies to the frame id at the active version.
    #[error("unknown frame id 0x{id:04X} for protocol version {version}")]
    UnknownFrameId { id: u16, version: u8 },

    /// The parameters did not match the schema.
    #[error("failed to decode {command}: {source}")]
    Decode {
        command: &'static str,
        source: SchemaError,
    },

    /// The NCP rejected the command with an `invalidCommand` frame.
    #[error("invalid command: {0}")]
    InvalidCommand(EzspStatus),
}

impl FrameFailure {
    /// Status code the protocol uses for this failure.
    pub fn status(&self) -> EzspStatus {
        match self {
            FrameFailure::TooShort { .. } => EzspStatus::ERROR_INVALID_VALUE,
            FrameFailure::WrongDirection => EzspStatus::ERROR_WRONG_DIRECTION,
            FrameFailure::Truncated => EzspStatus::ERROR_TRUNCATED,
            FrameFailure::Overflow => EzspStatus::ERROR_OVERFLOW,
            FrameFailure::UnsupportedControl(_) => EzspStatus::ERROR_UNSUPPORTED_CONTROL,
            FrameFailure::UnknownFrameId { .. } => EzspStatus::ERROR_INVALID_FRAME_ID,
            FrameFailure::Decode { .. } => EzspStatus::ERROR_INVALID_VALUE,
            FrameFailure::InvalidCommand(reason) => *reason,
        }
    }
}

/// A failed inbound frame, with whatever header fields could be read.
#[derive(Debug)]
pub struct FrameError {
    pub sequence: Option<u8>,
    pub frame_id: Option<u16>,
    /// Frame control, when the header could be read.
    pub control: Option<u16>,
    pub failure: FrameFailure,
}

impl FrameError {
    /// The frame control marks the frame as a callback.
    pub fn is_callback(&self) -> bool {
        self.control
            .is_some_and(|control| control as u8 & (FC_CALLBACK_SYNC | FC_CALLBACK_ASYNC) != 0)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failure)?;
        if let Some(sequence) = self.sequence {
            write!(f, " (seq {sequence}")?;
            if let Some(id) = self.frame_id {
                write!(f, ", frame 0x{id:04X}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Errors returned by EZSP host operations.
#[derive(Debug, thiserror::Error)]
pub enum EzspError {
    /// Opening or shutting down the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] ezsp_transport::TransportError),

    /// The ASH link failed or rejected the frame.
    #[error("link error: {0}")]
    Link(#[from] ezsp_ash::AshError),

    /// Arguments did not match the command schema, or the command is unknown.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The response frame could not be decoded, or the NCP rejected the command.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No matching frame arrived in time.
    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },

    /// The call was cancelled by `close`.
    #[error("cancelled")]
    Cancelled,

    /// The link failed while the call was outstanding.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection has been closed.
    #[error("connection closed")]
    Closed,

    /// Callbacks are sent by the NCP and cannot be executed.
    #[error("'{0}' is a callback, not a command")]
    NotACommand(&'static str),

    /// Legacy frame formats only carry one-byte frame ids.
    #[error("frame id 0x{id:04X} needs protocol version 8 or later (active: {version})")]
    UnsupportedFrameId { id: u16, version: u8 },

    /// The NCP answered with a non-success status.
    #[error("{command} failed: {status}")]
    Status {
        command: &'static str,
        status: EzspStatus,
    },

    /// A response lacked a field the caller relies on.
    #[error("{command} response has no usable '{field}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, EzspError>;
