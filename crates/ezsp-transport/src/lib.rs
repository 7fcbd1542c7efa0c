//! Byte-stream transport for Zigbee network co-processors.
//!
//! The NCP is reached over one of:
//! - a local serial device (`/dev/ttyUSB0`, `COM3`), opened 8N1 with optional
//!   RTS/CTS flow control
//! - a serial-over-TCP bridge, addressed as `tcp://host:port`
//!
//! This is the lowest layer of the stack. The ASH link layer builds on top of
//! the [`SerialStream`] type provided here and only assumes ordered,
//! byte-oriented delivery.

pub mod error;
pub mod options;
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use options::SerialOptions;
pub use serial::{list_ports, open, parse_tcp_path, PortInfo};
pub use stream::SerialStream;
