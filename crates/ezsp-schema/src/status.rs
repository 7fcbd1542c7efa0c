use std::fmt;

use serde::{Serialize, Serializer};

/// EZSP-level status code.
///
/// Codes outside the known set are kept as-is and print as `UNKNOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EzspStatus(pub u8);

macro_rules! statuses {
    ($($name:ident = $code:literal),+ $(,)?) => {
        impl EzspStatus {
            $(pub const $name: EzspStatus = EzspStatus($code);)+

            /// Protocol name of the code, if it is a known one.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    SUCCESS = 0x00,
    SPI_ERR_FATAL = 0x10,
    SPI_ERR_NCP_RESET = 0x11,
    SPI_ERR_OVERSIZED_FRAME = 0x12,
    SPI_ERR_ABORTED_TRANSACTION = 0x13,
    SPI_ERR_MISSING_FRAME_TERMINATOR = 0x14,
    SPI_ERR_WAIT_SECTION_TIMEOUT = 0x15,
    SPI_ERR_NO_FRAME_TERMINATOR = 0x16,
    SPI_ERR_COMMAND_OVERSIZED = 0x17,
    SPI_ERR_RESPONSE_OVERSIZED = 0x18,
    SPI_WAITING_FOR_RESPONSE = 0x19,
    SPI_ERR_HANDSHAKE_TIMEOUT = 0x1A,
    SPI_ERR_STARTUP_TIMEOUT = 0x1B,
    SPI_ERR_STARTUP_FAIL = 0x1C,
    SPI_ERR_UNSUPPORTED_SPI_COMMAND = 0x1D,
    ASH_IN_PROGRESS = 0x20,
    HOST_FATAL_ERROR = 0x21,
    ASH_NCP_FATAL_ERROR = 0x22,
    DATA_FRAME_TOO_LONG = 0x23,
    DATA_FRAME_TOO_SHORT = 0x24,
    NO_TX_SPACE = 0x25,
    NO_RX_SPACE = 0x26,
    NO_RX_DATA = 0x27,
    NOT_CONNECTED = 0x28,
    ERROR_VERSION_NOT_SET = 0x30,
    ERROR_INVALID_FRAME_ID = 0x31,
    ERROR_WRONG_DIRECTION = 0x32,
    ERROR_TRUNCATED = 0x33,
    ERROR_OVERFLOW = 0x34,
    ERROR_OUT_OF_MEMORY = 0x35,
    ERROR_INVALID_VALUE = 0x36,
    ERROR_INVALID_ID = 0x37,
    ERROR_INVALID_CALL = 0x38,
    ERROR_NO_RESPONSE = 0x39,
    ERROR_COMMAND_TOO_LONG = 0x40,
    ERROR_QUEUE_FULL = 0x41,
    ERROR_COMMAND_FILTERED = 0x42,
    ERROR_SECURITY_KEY_ALREADY_SET = 0x43,
    ERROR_SECURITY_TYPE_INVALID = 0x44,
    ERROR_SECURITY_PARAMETERS_INVALID = 0x45,
    ERROR_SECURITY_PARAMETERS_ALREADY_SET = 0x46,
    ERROR_SECURITY_KEY_NOT_SET = 0x47,
    ERROR_SECURITY_PARAMETERS_NOT_SET = 0x48,
    ERROR_UNSUPPORTED_CONTROL = 0x49,
    ERROR_UNSECURE_FRAME = 0x4A,
    ASH_ERROR_VERSION = 0x50,
    ASH_ERROR_TIMEOUTS = 0x51,
    ASH_ERROR_RESET_FAIL = 0x52,
    ASH_ERROR_NCP_RESET = 0x53,
    ERROR_SERIAL_INIT = 0x54,
    ASH_ERROR_NCP_TYPE = 0x55,
    ASH_ERROR_RESET_METHOD = 0x56,
    ASH_ERROR_XON_XOFF = 0x57,
    ASH_STARTED = 0x70,
    ASH_CONNECTED = 0x71,
    ASH_DISCONNECTED = 0x72,
    ASH_ACK_TIMEOUT = 0x73,
    ASH_CANCELLED = 0x74,
    ASH_OUT_OF_SEQUENCE = 0x75,
    ASH_BAD_CRC = 0x76,
    ASH_COMM_ERROR = 0x77,
    ASH_BAD_ACKNUM = 0x78,
    ASH_TOO_SHORT = 0x79,
    ASH_TOO_LONG = 0x7A,
    ASH_BAD_CONTROL = 0x7B,
    ASH_BAD_LENGTH = 0x7C,
    ASH_ACK_RECEIVED = 0x7D,
    ASH_ACK_SENT = 0x7E,
    NO_ERROR = 0xFF,
}

impl EzspStatus {
    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<u8> for EzspStatus {
    fn from(code: u8) -> Self {
        EzspStatus(code)
    }
}

impl fmt::Display for EzspStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name().unwrap_or("UNKNOWN"), self.0)
    }
}

impl Serialize for EzspStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(EzspStatus(0x32).name(), Some("ERROR_WRONG_DIRECTION"));
        assert_eq!(EzspStatus(0x33), EzspStatus::ERROR_TRUNCATED);
        assert_eq!(EzspStatus::ERROR_OVERFLOW.code(), 0x34);
        assert_eq!(
            EzspStatus::ERROR_UNSUPPORTED_CONTROL.to_string(),
            "ERROR_UNSUPPORTED_CONTROL (0x49)"
        );
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let status = EzspStatus::from(0x99);
        assert_eq!(status.code(), 0x99);
        assert_eq!(status.name(), None);
        assert_eq!(status.to_string(), "UNKNOWN (0x99)");
    }

    #[test]
    fn serializes_as_display_string() {
        assert_eq!(
            serde_json::to_string(&EzspStatus::SUCCESS).unwrap(),
            "\"SUCCESS (0x00)\""
        );
    }
}
