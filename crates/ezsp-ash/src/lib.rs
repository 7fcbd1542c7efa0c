//! ASH (Asynchronous Serial Host) link layer for EmberZNet NCPs.
//!
//! Every frame on the wire is:
//! - A control byte (DATA, ACK, NAK, RST, RSTACK or ERROR)
//! - An optional data field, LFSR-randomized for DATA frames
//! - A big-endian CRC-16/CCITT over control and data
//! - Byte stuffing for reserved octets and a closing 0x7E flag
//!
//! [`AshLink`] is the sans-io ARQ engine; [`AshConnection`] drives it over
//! a blocking serial stream on a background thread.

pub mod codec;
pub mod config;
pub mod connection;
pub mod checksum;
pub mod error;
pub mod escape;
pub mod frame;
pub mod link;
pub mod random;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::AshCodec;
pub use codec::{AshDecoder, Decoded};
pub use config::AshConfig;
pub use connection::AshConnection;
pub use error::{AshError, Result};
pub use escape::{escape, unescape, Unescaper};
pub use frame::{encode_frame, FrameKind, LinkFrame, ResetCode, ASH_VERSION, MAX_DATA_FIELD};
pub use link::{AshLink, LinkEvent, LinkState, ResetInfo};
pub use random::randomize;
pub use reader::LinkReader;
pub use writer::LinkWriter;
