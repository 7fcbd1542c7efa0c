//! Byte stuffing for reserved ASH octets.
//!
//! Inside a frame every reserved byte is sent as [`ESCAPE`] followed by the
//! byte XOR [`STUFF_MASK`]. The closing [`FLAG`] is never escaped.

use bytes::BufMut;

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;
/// Escape marker.
pub const ESCAPE: u8 = 0x7D;
/// Resume transmission (software flow control).
pub const XON: u8 = 0x11;
/// Stop transmission (software flow control).
pub const XOFF: u8 = 0x13;
/// Replaces a byte with a low-level receive error.
pub const SUBSTITUTE: u8 = 0x18;
/// Discards any partially received frame.
pub const CANCEL: u8 = 0x1A;
/// Sent by the NCP to wake the host; ignored between frames.
pub const WAKE: u8 = 0xFF;
/// XOR applied to an escaped byte.
pub const STUFF_MASK: u8 = 0x20;

/// Bytes that never appear unescaped inside a frame.
pub const RESERVED: [u8; 6] = [FLAG, ESCAPE, XON, XOFF, SUBSTITUTE, CANCEL];

/// Returns true if `byte` must be escaped inside a frame.
pub fn is_reserved(byte: u8) -> bool {
    RESERVED.contains(&byte)
}

/// Append the stuffed form of `data` to `dst`.
pub fn escape_into(data: &[u8], dst: &mut impl BufMut) {
    for &byte in data {
        if is_reserved(byte) {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ STUFF_MASK);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Stuff `data` into a new buffer.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 4);
    escape_into(data, &mut out);
    out
}

/// Reverse [`escape`] in one shot.
///
/// A trailing lone [`ESCAPE`] is dropped.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut unescaper = Unescaper::new();
    data.iter().filter_map(|&b| unescaper.push(b)).collect()
}

/// Incremental unstuffer that survives an escape split across reads.
#[derive(Debug, Default, Clone)]
pub struct Unescaper {
    escaped: bool,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one wire byte; returns the decoded byte, if any.
    pub fn push(&mut self, byte: u8) -> Option<u8> {
        if self.escaped {
            self.escaped = false;
            return Some(byte ^ STUFF_MASK);
        }
        if byte == ESCAPE {
            self.escaped = true;
            return None;
        }
        Some(byte)
    }

    /// True while an escape marker is waiting for its partner byte.
    pub fn is_pending(&self) -> bool {
        self.escaped
    }

    pub fn reset(&mut self) {
        self.escaped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_passthrough() {
        assert_eq!(escape(&[0x00, 0x42, 0xC0]), vec![0x00, 0x42, 0xC0]);
    }

    #[test]
    fn test_escape_every_reserved_byte() {
        assert_eq!(escape(&[FLAG]), vec![0x7D, 0x5E]);
        assert_eq!(escape(&[ESCAPE]), vec![0x7D, 0x5D]);
        assert_eq!(escape(&[XON]), vec![0x7D, 0x31]);
        assert_eq!(escape(&[XOFF]), vec![0x7D, 0x33]);
        assert_eq!(escape(&[SUBSTITUTE]), vec![0x7D, 0x38]);
        assert_eq!(escape(&[CANCEL]), vec![0x7D, 0x3A]);
    }

    #[test]
    fn test_escaped_output_has_no_reserved_bytes_besides_marker() {
        let data: Vec<u8> = (0..=255).collect();
        let stuffed = escape(&data);
        assert!(stuffed
            .iter()
            .all(|&b| b == ESCAPE || !is_reserved(b)));
        assert_eq!(unescape(&stuffed), data);
    }

    #[test]
    fn test_unescaper_split_across_chunks() {
        let mut unescaper = Unescaper::new();
        assert_eq!(unescaper.push(ESCAPE), None);
        assert!(unescaper.is_pending());
        assert_eq!(unescaper.push(0x5E), Some(FLAG));
        assert!(!unescaper.is_pending());
        assert_eq!(unescaper.push(0x01), Some(0x01));
    }

    #[test]
    fn test_unescape_drops_trailing_marker() {
        assert_eq!(unescape(&[0x01, ESCAPE]), vec![0x01]);
    }
}
