//! EZSP frame envelope: sequence, frame control and frame id around the
//! schema-encoded parameters.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use ezsp_schema::commands::{INVALID_COMMAND, VERSION};
use ezsp_schema::{CommandSchema, EzspStatus, Record, SchemaError, SchemaRegistry, Value};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{info, trace};

use crate::error::{EzspError, FrameError, FrameFailure, Result};

/// Frame control bit set on responses and callbacks.
pub const FC_DIRECTION_RESPONSE: u8 = 0x80;
pub const FC_NETWORK_INDEX_MASK: u8 = 0x60;
pub const FC_NETWORK_INDEX_SHIFT: u8 = 5;
pub const FC_CALLBACK_ASYNC: u8 = 0x10;
pub const FC_CALLBACK_SYNC: u8 = 0x08;
pub const FC_PENDING_CALLBACKS: u8 = 0x04;
pub const FC_TRUNCATED: u8 = 0x02;
pub const FC_OVERFLOW: u8 = 0x01;

/// Extended frame control (high byte): security enabled.
pub const FC_HI_SECURITY: u8 = 0x80;
/// Extended frame control (high byte): padding enabled.
pub const FC_HI_PADDING: u8 = 0x40;
pub const FC_HI_RESERVED: u8 = 0x3C;
pub const FC_HI_FORMAT_MASK: u8 = 0x03;
/// The only extended frame format version.
pub const FC_HI_FORMAT_VERSION: u8 = 0x01;

/// Legacy frame id marking a two-byte frame control.
pub const LEGACY_EXTENSION_MARKER: u8 = 0xFF;

/// First protocol version using the extended (two-byte id) header.
pub const EXTENDED_HEADER_VERSION: u8 = 8;
/// First protocol version using the 0xFF-extended legacy header.
pub const MARKED_LEGACY_VERSION: u8 = 5;

/// Whether the NCP sent the frame in response to a command or on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// A command response.
    None,
    /// A callback returned by the `callback` command.
    Sync,
    /// A callback sent without being polled.
    Async,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EzspFrame {
    pub sequence: u8,
    /// Frame control; the high byte is zero for legacy frames.
    pub control: u16,
    pub frame_id: u16,
    pub command: &'static CommandSchema,
    pub params: Record,
}

impl EzspFrame {
    pub fn name(&self) -> &'static str {
        self.command.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.params.get(field)
    }

    pub fn network_index(&self) -> u8 {
        (self.control as u8 & FC_NETWORK_INDEX_MASK) >> FC_NETWORK_INDEX_SHIFT
    }

    /// The NCP has more callbacks queued.
    pub fn pending_callbacks(&self) -> bool {
        self.control as u8 & FC_PENDING_CALLBACKS != 0
    }

    pub fn callback_kind(&self) -> CallbackKind {
        let low = self.control as u8;
        if low & FC_CALLBACK_ASYNC != 0 {
            CallbackKind::Async
        } else if low & FC_CALLBACK_SYNC != 0 {
            CallbackKind::Sync
        } else {
            CallbackKind::None
        }
    }

    /// Read a `status` field as an [`EzspStatus`].
    pub fn status(&self) -> Option<EzspStatus> {
        self.params
            .get_u64("status")
            .and_then(|status| u8::try_from(status).ok())
            .map(EzspStatus)
    }
}

impl Serialize for EzspFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EzspFrame", 5)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("frameId", &self.frame_id)?;
        state.serialize_field("sequence", &self.sequence)?;
        state.serialize_field("control", &self.control)?;
        state.serialize_field("params", &self.params)?;
        state.end()
    }
}

/// Request arguments in any form the codec can encode.
pub trait Arguments {
    fn encode_for(&self, command: &CommandSchema, out: &mut BytesMut)
        -> std::result::Result<(), SchemaError>;
}

impl Arguments for Record {
    fn encode_for(
        &self,
        command: &CommandSchema,
        out: &mut BytesMut,
    ) -> std::result::Result<(), SchemaError> {
        command.encode_request(self, out)
    }
}

impl Arguments for [Value] {
    fn encode_for(
        &self,
        command: &CommandSchema,
        out: &mut BytesMut,
    ) -> std::result::Result<(), SchemaError> {
        command.encode_request_values(self, out)
    }
}

impl<const N: usize> Arguments for [Value; N] {
    fn encode_for(
        &self,
        command: &CommandSchema,
        out: &mut BytesMut,
    ) -> std::result::Result<(), SchemaError> {
        command.encode_request_values(self, out)
    }
}

impl Arguments for Vec<Value> {
    fn encode_for(
        &self,
        command: &CommandSchema,
        out: &mut BytesMut,
    ) -> std::result::Result<(), SchemaError> {
        command.encode_request_values(self, out)
    }
}

/// No arguments.
impl Arguments for () {
    fn encode_for(
        &self,
        command: &CommandSchema,
        out: &mut BytesMut,
    ) -> std::result::Result<(), SchemaError> {
        command.encode_request_values(&[], out)
    }
}

struct Header {
    sequence: u8,
    control: u16,
    frame_id: u16,
    extended: bool,
    params_at: usize,
}

/// Encodes commands and decodes responses at the active protocol version.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    registry: Arc<SchemaRegistry>,
    version: u8,
}

impl FrameCodec {
    pub fn new(registry: Arc<SchemaRegistry>, version: u8) -> Self {
        Self { registry, version }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Build a command frame.
    pub fn encode<A: Arguments + ?Sized>(
        &self,
        command: &CommandSchema,
        sequence: u8,
        args: &A,
    ) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(16);
        out.put_u8(sequence);
        if self.version >= EXTENDED_HEADER_VERSION {
            out.put_u8(0x00);
            out.put_u8(FC_HI_FORMAT_VERSION);
            out.put_u16_le(command.id);
        } else {
            let id = u8::try_from(command.id).map_err(|_| EzspError::UnsupportedFrameId {
                id: command.id,
                version: self.version,
            })?;
            out.put_u8(0x00);
            if self.version >= MARKED_LEGACY_VERSION {
                out.put_u8(LEGACY_EXTENSION_MARKER);
                out.put_u8(0x00);
            }
            out.put_u8(id);
        }
        args.encode_for(command, &mut out)?;
        Ok(out.freeze())
    }

    /// Decode a frame received from the NCP.
    ///
    /// Reserved extended control bits are rejected before anything else is
    /// looked at. An `invalidCommand` frame is reported as a failure carrying its
    /// reason. A decoded `version` response switches the codec to the
    /// version the NCP reports.
    pub fn decode(&mut self, body: &[u8]) -> std::result::Result<EzspFrame, FrameError> {
        let header = self.parse_header(body)?;
        let fail = |failure| FrameError {
            sequence: Some(header.sequence),
            frame_id: Some(header.frame_id),
            control: Some(header.control),
            failure,
        };
        let params = &body[header.params_at..];
        let low = header.control as u8;
        let high = (header.control >> 8) as u8;

        if header.extended && high & FC_HI_RESERVED != 0 {
            return Err(fail(FrameFailure::UnsupportedControl(header.control)));
        }
        if header.frame_id == INVALID_COMMAND {
            let reason = params.first().copied().map(EzspStatus).ok_or_else(|| {
                fail(FrameFailure::Decode {
                    command: "invalidCommand",
                    source: SchemaError::Underrun {
                        needed: 1,
                        remaining: 0,
                    },
                })
            })?;
            return Err(fail(FrameFailure::InvalidCommand(reason)));
        }
        if low & FC_DIRECTION_RESPONSE == 0 {
            return Err(fail(FrameFailure::WrongDirection));
        }
        if low & FC_TRUNCATED != 0 {
            return Err(fail(FrameFailure::Truncated));
        }
        if low & FC_OVERFLOW != 0 {
            return Err(fail(FrameFailure::Overflow));
        }

        let (command, params) = self
            .registry
            .decode_response(header.frame_id, self.version, params)
            .map_err(|err| match err {
                SchemaError::UnknownFrameId { id, version } => {
                    fail(FrameFailure::UnknownFrameId { id, version })
                }
                source => {
                    let command = self
                        .registry
                        .resolve(header.frame_id, self.version)
                        .map_or("unknown", |c| c.name);
                    fail(FrameFailure::Decode { command, source })
                }
            })?;

        if command.id == VERSION {
            if let Some(version) = params
                .get_u64("protocolVersion")
                .and_then(|v| u8::try_from(v).ok())
            {
                if version != self.version {
                    info!(from = self.version, to = version, "EZSP protocol version changed");
                }
                self.version = version;
            }
        }

        trace!(
            name = command.name,
            sequence = header.sequence,
            extended = header.extended,
            "decoded frame"
        );
        Ok(EzspFrame {
            sequence: header.sequence,
            control: header.control,
            frame_id: header.frame_id,
            command,
            params,
        })
    }

    fn parse_header(&self, body: &[u8]) -> std::result::Result<Header, FrameError> {
        let too_short = || FrameError {
            sequence: body.first().copied(),
            frame_id: None,
            control: None,
            failure: FrameFailure::TooShort { len: body.len() },
        };
        let [sequence, control, marker, ..] = *body else {
            return Err(too_short());
        };

        if self.version >= EXTENDED_HEADER_VERSION
            && body.len() >= 5
            && marker & FC_HI_FORMAT_MASK == FC_HI_FORMAT_VERSION
        {
            return Ok(Header {
                sequence,
                control: u16::from_le_bytes([control, marker]),
                frame_id: u16::from_le_bytes([body[3], body[4]]),
                extended: true,
                params_at: 5,
            });
        }

        if marker == LEGACY_EXTENSION_MARKER {
            let [_, _, _, control_hi, id, ..] = *body else {
                return Err(too_short());
            };
            return Ok(Header {
                sequence,
                control: u16::from_le_bytes([control, control_hi]),
                frame_id: u16::from(id),
                extended: false,
                params_at: 5,
            });
        }

        Ok(Header {
            sequence,
            control: u16::from(control),
            frame_id: u16::from(marker),
            extended: false,
            params_at: 3,
        })
    }
}
