//! ASH frame kinds, classification and encoding.
//!
//! Wire format of one frame (before byte stuffing):
//! ```text
//! ┌─────────┬──────────────────────┬──────────┬──────┐
//! │ Control │ Data (0..=128 bytes) │ CRC (BE) │ Flag │
//! │  (1B)   │                      │   (2B)   │ 0x7E │
//! └─────────┴──────────────────────┴──────────┴──────┘
//! ```
//! Lengths below are measured over the unstuffed frame including the flag.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::error::{AshError, Result};
use crate::escape::{escape_into, FLAG};
use crate::random::randomize_in_place;

/// Shortest DATA frame: control, 3-byte EZSP header, CRC and flag.
pub const DATA_FRAME_MIN_LEN: usize = 7;
/// Longest DATA frame: control, 128 data bytes, CRC and flag.
pub const DATA_FRAME_MAX_LEN: usize = 132;
/// Length of ACK, NAK and RST frames.
pub const SHORT_FRAME_LEN: usize = 4;
/// Length of RSTACK and ERROR frames.
pub const STATUS_FRAME_LEN: usize = 6;
/// Largest data field a DATA frame can carry.
pub const MAX_DATA_FIELD: usize = 128;
/// Only supported ASH protocol version.
pub const ASH_VERSION: u8 = 2;

const CONTROL_RST: u8 = 0xC0;
const CONTROL_RSTACK: u8 = 0xC1;
const CONTROL_ERROR: u8 = 0xC2;
const SHORT_KIND_MASK: u8 = 0xE0;
const SHORT_KIND_ACK: u8 = 0x80;
const SHORT_KIND_NAK: u8 = 0xA0;
const FRM_NUM_MASK: u8 = 0x70;
const RETRANSMIT_BIT: u8 = 0x08;
const NOT_READY_BIT: u8 = 0x08;
const ACK_NUM_MASK: u8 = 0x07;

/// Why the NCP last reset, as reported in RSTACK and ERROR frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCode {
    UnknownReason,
    External,
    PowerOn,
    Watchdog,
    Assert,
    Bootloader,
    Software,
    ExceededMaximumAckTimeoutCount,
    UnknownEm3xxError,
    Other(u8),
}

impl ResetCode {
    pub fn code(self) -> u8 {
        match self {
            ResetCode::UnknownReason => 0x00,
            ResetCode::External => 0x01,
            ResetCode::PowerOn => 0x02,
            ResetCode::Watchdog => 0x03,
            ResetCode::Assert => 0x06,
            ResetCode::Bootloader => 0x09,
            ResetCode::Software => 0x0B,
            ResetCode::ExceededMaximumAckTimeoutCount => 0x51,
            ResetCode::UnknownEm3xxError => 0x80,
            ResetCode::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResetCode::UnknownReason => "RESET_UNKNOWN_REASON",
            ResetCode::External => "RESET_EXTERNAL",
            ResetCode::PowerOn => "RESET_POWER_ON",
            ResetCode::Watchdog => "RESET_WATCHDOG",
            ResetCode::Assert => "RESET_ASSERT",
            ResetCode::Bootloader => "RESET_BOOTLOADER",
            ResetCode::Software => "RESET_SOFTWARE",
            ResetCode::ExceededMaximumAckTimeoutCount => "ERROR_EXCEEDED_MAXIMUM_ACK_TIMEOUT_COUNT",
            ResetCode::UnknownEm3xxError => "RESET_UNKNOWN_EM3XX_ERROR",
            ResetCode::Other(_) => "RESET_OTHER",
        }
    }
}

impl From<u8> for ResetCode {
    fn from(code: u8) -> Self {
        match code {
            0x00 => ResetCode::UnknownReason,
            0x01 => ResetCode::External,
            0x02 => ResetCode::PowerOn,
            0x03 => ResetCode::Watchdog,
            0x06 => ResetCode::Assert,
            0x09 => ResetCode::Bootloader,
            0x0B => ResetCode::Software,
            0x51 => ResetCode::ExceededMaximumAckTimeoutCount,
            0x80 => ResetCode::UnknownEm3xxError,
            other => ResetCode::Other(other),
        }
    }
}

impl fmt::Display for ResetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// Decoded meaning of a frame's control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data {
        frm_num: u8,
        re_tx: bool,
        ack_num: u8,
    },
    Ack {
        ack_num: u8,
        n_rdy: bool,
    },
    Nak {
        ack_num: u8,
        n_rdy: bool,
    },
    Reset,
    ResetAck {
        version: u8,
        code: ResetCode,
    },
    Error {
        version: u8,
        code: ResetCode,
    },
    Invalid,
}

impl FrameKind {
    /// Control byte for this kind. `None` for [`FrameKind::Invalid`].
    pub fn control(&self) -> Option<u8> {
        let control = match *self {
            FrameKind::Data {
                frm_num,
                re_tx,
                ack_num,
            } => {
                ((frm_num << 4) & FRM_NUM_MASK)
                    | if re_tx { RETRANSMIT_BIT } else { 0 }
                    | (ack_num & ACK_NUM_MASK)
            }
            FrameKind::Ack { ack_num, n_rdy } => {
                SHORT_KIND_ACK | if n_rdy { NOT_READY_BIT } else { 0 } | (ack_num & ACK_NUM_MASK)
            }
            FrameKind::Nak { ack_num, n_rdy } => {
                SHORT_KIND_NAK | if n_rdy { NOT_READY_BIT } else { 0 } | (ack_num & ACK_NUM_MASK)
            }
            FrameKind::Reset => CONTROL_RST,
            FrameKind::ResetAck { .. } => CONTROL_RSTACK,
            FrameKind::Error { .. } => CONTROL_ERROR,
            FrameKind::Invalid => return None,
        };
        Some(control)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Data { .. } => "DATA",
            FrameKind::Ack { .. } => "ACK",
            FrameKind::Nak { .. } => "NAK",
            FrameKind::Reset => "RST",
            FrameKind::ResetAck { .. } => "RSTACK",
            FrameKind::Error { .. } => "ERROR",
            FrameKind::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Data {
                frm_num,
                re_tx,
                ack_num,
            } => write!(
                f,
                "DATA(frm={frm_num}, ack={ack_num}, re_tx={})",
                u8::from(*re_tx)
            ),
            FrameKind::Ack { ack_num, n_rdy } | FrameKind::Nak { ack_num, n_rdy } => write!(
                f,
                "{}(ack={ack_num}{})",
                self.name(),
                if *n_rdy { ", n_rdy" } else { "" }
            ),
            FrameKind::ResetAck { version, code } | FrameKind::Error { version, code } => {
                write!(f, "{}(v{version}, {code})", self.name())
            }
            FrameKind::Reset | FrameKind::Invalid => f.write_str(self.name()),
        }
    }
}

/// One received frame after unstuffing: control byte, data field and CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    kind: FrameKind,
    raw: Bytes,
}

impl LinkFrame {
    /// Classify an unstuffed frame. A trailing [`FLAG`] is optional.
    pub fn classify(raw: impl Into<Bytes>) -> Self {
        let mut raw: Bytes = raw.into();
        if raw.last() == Some(&FLAG) {
            raw.truncate(raw.len() - 1);
        }
        let kind = classify_body(&raw);
        Self { kind, raw }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Control byte, data field and CRC, without the flag.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Length on the wire before stuffing, flag included.
    pub fn wire_len(&self) -> usize {
        self.raw.len() + 1
    }

    /// True when the trailing CRC matches. INVALID frames never verify.
    pub fn verify_crc(&self) -> bool {
        self.kind != FrameKind::Invalid && checksum::verify(&self.raw)
    }

    /// Data field as received, still randomized for DATA frames.
    pub fn data(&self) -> &[u8] {
        if self.raw.len() < 3 {
            return &[];
        }
        &self.raw[1..self.raw.len() - 2]
    }

    /// Data field with randomization removed when `randomized` is set.
    pub fn payload(&self, randomized: bool) -> Bytes {
        if self.raw.len() < 3 {
            return Bytes::new();
        }
        let data = self.raw.slice(1..self.raw.len() - 2);
        if !randomized {
            return data;
        }
        let mut plain = BytesMut::from(data.as_ref());
        randomize_in_place(&mut plain);
        plain.freeze()
    }
}

fn classify_body(body: &[u8]) -> FrameKind {
    let Some(&control) = body.first() else {
        return FrameKind::Invalid;
    };
    let len = body.len() + 1;

    if control & 0x80 == 0 {
        if !(DATA_FRAME_MIN_LEN..=DATA_FRAME_MAX_LEN).contains(&len) {
            return FrameKind::Invalid;
        }
        return FrameKind::Data {
            frm_num: (control & FRM_NUM_MASK) >> 4,
            re_tx: control & RETRANSMIT_BIT != 0,
            ack_num: control & ACK_NUM_MASK,
        };
    }

    match control & SHORT_KIND_MASK {
        SHORT_KIND_ACK if len == SHORT_FRAME_LEN => FrameKind::Ack {
            ack_num: control & ACK_NUM_MASK,
            n_rdy: control & NOT_READY_BIT != 0,
        },
        SHORT_KIND_NAK if len == SHORT_FRAME_LEN => FrameKind::Nak {
            ack_num: control & ACK_NUM_MASK,
            n_rdy: control & NOT_READY_BIT != 0,
        },
        _ => match control {
            CONTROL_RST if len == SHORT_FRAME_LEN => FrameKind::Reset,
            CONTROL_RSTACK if len == STATUS_FRAME_LEN => FrameKind::ResetAck {
                version: body[1],
                code: ResetCode::from(body[2]),
            },
            CONTROL_ERROR if len == STATUS_FRAME_LEN => FrameKind::Error {
                version: body[1],
                code: ResetCode::from(body[2]),
            },
            _ => FrameKind::Invalid,
        },
    }
}

/// Encode one complete frame (stuffed, CRC, closing flag) into `dst`.
///
/// `data` is only used by DATA frames and is randomized when `randomize`
/// is set. RSTACK and ERROR carry their version and code from `kind`.
pub fn encode_frame(
    kind: &FrameKind,
    data: &[u8],
    randomize: bool,
    dst: &mut BytesMut,
) -> Result<()> {
    let control = kind.control().ok_or(AshError::InvalidFrame)?;

    let mut body = BytesMut::with_capacity(3 + data.len());
    body.put_u8(control);
    match *kind {
        FrameKind::Data { .. } => {
            if data.len() > MAX_DATA_FIELD {
                return Err(AshError::PayloadTooLarge {
                    size: data.len(),
                    max: MAX_DATA_FIELD,
                });
            }
            let start = body.len();
            body.put_slice(data);
            if randomize {
                randomize_in_place(&mut body[start..]);
            }
        }
        FrameKind::ResetAck { version, code } | FrameKind::Error { version, code } => {
            body.put_u8(version);
            body.put_u8(code.code());
        }
        _ => {}
    }
    let fcs = checksum::crc16(&body);
    body.put_u16(fcs);

    dst.reserve(body.len() * 2 + 1);
    escape_into(&body, dst);
    dst.put_u8(FLAG);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(kind: FrameKind, data: &[u8], randomize: bool) -> Vec<u8> {
        let mut dst = BytesMut::new();
        encode_frame(&kind, data, randomize, &mut dst).unwrap();
        dst.to_vec()
    }

    #[test]
    fn test_classify_data_frame() {
        let frame = LinkFrame::classify(vec![0x25, 0x00, 0x00, 0x00, 0x02, 0x1A, 0xAD, 0x7E]);
        assert_eq!(
            frame.kind(),
            FrameKind::Data {
                frm_num: 2,
                re_tx: false,
                ack_num: 5
            }
        );
        assert!(frame.verify_crc());
        assert_eq!(frame.data(), &[0x00, 0x00, 0x00, 0x02]);
        assert_eq!(frame.wire_len(), 8);
    }

    #[test]
    fn test_classify_randomized_data_frame() {
        let frame = LinkFrame::classify(vec![0x25, 0x42, 0x21, 0xA8, 0x56, 0xA6, 0x09, 0x7E]);
        assert!(frame.verify_crc());
        assert_eq!(frame.payload(true).as_ref(), &[0x00, 0x00, 0x00, 0x02]);
        assert_eq!(frame.payload(false).as_ref(), &[0x42, 0x21, 0xA8, 0x56]);
    }

    #[test]
    fn test_classify_ack_and_nak() {
        let ack = LinkFrame::classify(vec![0x81, 0x60, 0x59, 0x7E]);
        assert_eq!(
            ack.kind(),
            FrameKind::Ack {
                ack_num: 1,
                n_rdy: false
            }
        );
        assert!(ack.verify_crc());

        let ack = LinkFrame::classify(vec![0x8E, 0x91, 0xB6, 0x7E]);
        assert_eq!(
            ack.kind(),
            FrameKind::Ack {
                ack_num: 6,
                n_rdy: true
            }
        );

        let nak = LinkFrame::classify(vec![0xA6, 0x34, 0xDC, 0x7E]);
        assert_eq!(
            nak.kind(),
            FrameKind::Nak {
                ack_num: 6,
                n_rdy: false
            }
        );

        let nak = LinkFrame::classify(vec![0xAD, 0x85, 0xB7, 0x7E]);
        assert_eq!(
            nak.kind(),
            FrameKind::Nak {
                ack_num: 5,
                n_rdy: true
            }
        );
        assert!(nak.verify_crc());
    }

    #[test]
    fn test_classify_reset_frames() {
        assert_eq!(
            LinkFrame::classify(vec![0xC0, 0x38, 0xBC, 0x7E]).kind(),
            FrameKind::Reset
        );

        let rstack = LinkFrame::classify(vec![0xC1, 0x02, 0x02, 0x9B, 0x7B, 0x7E]);
        assert_eq!(
            rstack.kind(),
            FrameKind::ResetAck {
                version: 2,
                code: ResetCode::PowerOn
            }
        );
        assert!(rstack.verify_crc());

        let error = LinkFrame::classify(vec![0xC2, 0x02, 0x51, 0xA8, 0xBD, 0x7E]);
        assert_eq!(
            error.kind(),
            FrameKind::Error {
                version: 2,
                code: ResetCode::ExceededMaximumAckTimeoutCount
            }
        );
        assert!(error.verify_crc());
    }

    #[test]
    fn test_trailing_flag_is_optional() {
        let with_flag = LinkFrame::classify(vec![0x81, 0x60, 0x59, 0x7E]);
        let without = LinkFrame::classify(vec![0x81, 0x60, 0x59]);
        assert_eq!(with_flag, without);
    }

    #[test]
    fn test_truncated_data_is_invalid() {
        let frame = LinkFrame::classify(vec![0x25, 0x00, 0x1A, 0x7E]);
        assert_eq!(frame.kind(), FrameKind::Invalid);
        assert!(!frame.verify_crc());
    }

    #[test]
    fn test_wrong_lengths_are_invalid() {
        assert_eq!(
            LinkFrame::classify(vec![0x81, 0x00, 0x60, 0x59, 0x7E]).kind(),
            FrameKind::Invalid
        );
        assert_eq!(
            LinkFrame::classify(vec![0xC1, 0x02, 0x9B, 0x7E]).kind(),
            FrameKind::Invalid
        );
        assert_eq!(LinkFrame::classify(vec![0xC3, 0x00, 0x00, 0x7E]).kind(), FrameKind::Invalid);
        assert_eq!(LinkFrame::classify(Vec::new()).kind(), FrameKind::Invalid);
        assert_eq!(LinkFrame::classify(vec![0x7E]).kind(), FrameKind::Invalid);

        let oversized = vec![0u8; DATA_FRAME_MAX_LEN];
        assert_eq!(LinkFrame::classify(oversized).kind(), FrameKind::Invalid);
    }

    #[test]
    fn test_bad_crc_fails_verification() {
        let frame = LinkFrame::classify(vec![0x81, 0x60, 0x58, 0x7E]);
        assert!(matches!(frame.kind(), FrameKind::Ack { .. }));
        assert!(!frame.verify_crc());
    }

    #[test]
    fn test_unknown_reset_code_is_preserved() {
        assert_eq!(ResetCode::from(0x42), ResetCode::Other(0x42));
        assert_eq!(ResetCode::Other(0x42).code(), 0x42);
        assert_eq!(ResetCode::from(0x0B), ResetCode::Software);
        assert_eq!(ResetCode::Software.to_string(), "RESET_SOFTWARE (0x0B)");
    }

    #[test]
    fn test_encode_short_frames() {
        assert_eq!(
            encoded(
                FrameKind::Ack {
                    ack_num: 1,
                    n_rdy: false
                },
                &[],
                true
            ),
            vec![0x81, 0x60, 0x59, 0x7E]
        );
        assert_eq!(
            encoded(
                FrameKind::Ack {
                    ack_num: 6,
                    n_rdy: true
                },
                &[],
                true
            ),
            vec![0x8E, 0x91, 0xB6, 0x7E]
        );
        assert_eq!(
            encoded(
                FrameKind::Nak {
                    ack_num: 6,
                    n_rdy: false
                },
                &[],
                true
            ),
            vec![0xA6, 0x34, 0xDC, 0x7E]
        );
        assert_eq!(encoded(FrameKind::Reset, &[], true), vec![0xC0, 0x38, 0xBC, 0x7E]);
    }

    #[test]
    fn test_encode_status_frames() {
        assert_eq!(
            encoded(
                FrameKind::ResetAck {
                    version: 2,
                    code: ResetCode::Software
                },
                &[],
                false
            ),
            vec![0xC1, 0x02, 0x0B, 0x0A, 0x52, 0x7E]
        );
        assert_eq!(
            encoded(
                FrameKind::Error {
                    version: 1,
                    code: ResetCode::Other(0x52)
                },
                &[],
                false
            ),
            vec![0xC2, 0x01, 0x52, 0xCD, 0x8D, 0x7E]
        );
    }

    #[test]
    fn test_encode_data_stuffs_reserved_crc_byte() {
        let kind = FrameKind::Data {
            frm_num: 2,
            re_tx: false,
            ack_num: 5,
        };
        assert_eq!(
            encoded(kind, &[0x00, 0x00, 0x00, 0x02], false),
            vec![0x25, 0x00, 0x00, 0x00, 0x02, 0x7D, 0x3A, 0xAD, 0x7E]
        );
        assert_eq!(
            encoded(kind, &[0x00, 0x00, 0x00, 0x02], true),
            vec![0x25, 0x42, 0x21, 0xA8, 0x56, 0xA6, 0x09, 0x7E]
        );
    }

    #[test]
    fn test_encode_retransmitted_data() {
        let kind = FrameKind::Data {
            frm_num: 5,
            re_tx: false,
            ack_num: 3,
        };
        let data = [0x00, 0x80, 0x00, 0x02, 0x02, 0x11, 0x30];
        assert_eq!(
            encoded(kind, &data, false),
            vec![0x53, 0x00, 0x80, 0x00, 0x02, 0x02, 0x7D, 0x31, 0x30, 0x63, 0x16, 0x7E]
        );
        assert_eq!(
            encoded(kind, &data, true),
            vec![0x53, 0x42, 0xA1, 0xA8, 0x56, 0x28, 0x04, 0x82, 0x03, 0x2A, 0x7E]
        );

        let mut dst = BytesMut::new();
        encode_frame(
            &FrameKind::Data {
                frm_num: 5,
                re_tx: true,
                ack_num: 3,
            },
            &data,
            true,
            &mut dst,
        )
        .unwrap();
        assert_eq!(dst[0], 0x5B);
    }

    #[test]
    fn test_encode_rejects_invalid_and_oversized() {
        let mut dst = BytesMut::new();
        assert!(matches!(
            encode_frame(&FrameKind::Invalid, &[], false, &mut dst),
            Err(AshError::InvalidFrame)
        ));

        let data = vec![0u8; MAX_DATA_FIELD + 1];
        let kind = FrameKind::Data {
            frm_num: 0,
            re_tx: false,
            ack_num: 0,
        };
        assert!(matches!(
            encode_frame(&kind, &data, true, &mut dst),
            Err(AshError::PayloadTooLarge { size: 129, max: 128 })
        ));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_display() {
        let kind = FrameKind::Data {
            frm_num: 2,
            re_tx: true,
            ack_num: 5,
        };
        assert_eq!(kind.to_string(), "DATA(frm=2, ack=5, re_tx=1)");
        assert_eq!(
            FrameKind::Nak {
                ack_num: 3,
                n_rdy: true
            }
            .to_string(),
            "NAK(ack=3, n_rdy)"
        );
    }
}
