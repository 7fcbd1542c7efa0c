use std::fmt;
use std::io;

use ezsp_ash::AshError;
use ezsp_host::EzspError;
use ezsp_schema::SchemaError;
use ezsp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: AshError) -> CliError {
    match err {
        AshError::Io(source) => io_error(context, source),
        AshError::ResetTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        AshError::PayloadTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::UnknownCommand(_) | SchemaError::ArgumentCount { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn ezsp_error(context: &str, err: EzspError) -> CliError {
    match err {
        EzspError::Transport(err) => transport_error(context, err),
        EzspError::Link(err) => link_error(context, err),
        EzspError::Schema(err) => schema_error(context, err),
        EzspError::Frame(_) | EzspError::MissingField { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        EzspError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        EzspError::NotACommand(_) | EzspError::UnsupportedFrameId { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        EzspError::ConnectionFailed(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        EzspError::Status { .. } | EzspError::Cancelled | EzspError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}
