//! Streaming ASH frame decoder and the optional tokio codec.

use bytes::{Buf, BufMut, BytesMut};
use tracing::{trace, warn};

use crate::escape::{Unescaper, CANCEL, FLAG, SUBSTITUTE, WAKE, XOFF, XON};
use crate::frame::{LinkFrame, DATA_FRAME_MAX_LEN};

/// Longest unstuffed frame body the decoder will buffer (flag excluded).
pub const MAX_FRAME_BODY: usize = DATA_FRAME_MAX_LEN - 1;

/// One item recovered from the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A flag-terminated frame, unstuffed and classified.
    Frame(LinkFrame),
    /// XON: the NCP can accept DATA again.
    Xon,
    /// XOFF: the NCP asks the host to stop sending DATA.
    Xoff,
}

/// Streaming frame decoder.
///
/// Bytes are consumed from the front of the source buffer one at a time;
/// a partially received frame is kept across calls.
#[derive(Debug, Default)]
pub struct AshDecoder {
    frame: BytesMut,
    unescaper: Unescaper,
    discarding: bool,
}

impl AshDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next item from `src`.
    ///
    /// Returns `None` once `src` is exhausted without completing an item.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Decoded> {
        while src.has_remaining() {
            let byte = src.get_u8();
            match byte {
                FLAG => {
                    if self.discarding {
                        trace!("resynchronized on flag");
                        self.clear();
                        continue;
                    }
                    if self.frame.is_empty() {
                        continue;
                    }
                    if self.unescaper.is_pending() {
                        warn!("frame ended inside an escape sequence, discarding");
                        self.clear();
                        continue;
                    }
                    let raw = self.frame.split().freeze();
                    return Some(Decoded::Frame(LinkFrame::classify(raw)));
                }
                CANCEL => {
                    if !self.frame.is_empty() {
                        trace!(discarded = self.frame.len(), "cancel byte received");
                    }
                    self.clear();
                }
                SUBSTITUTE => {
                    warn!("substitute byte received, discarding frame");
                    self.clear();
                    self.discarding = true;
                }
                XON => return Some(Decoded::Xon),
                XOFF => return Some(Decoded::Xoff),
                WAKE if self.frame.is_empty() && !self.unescaper.is_pending() => {}
                _ if self.discarding => {}
                _ => {
                    let Some(byte) = self.unescaper.push(byte) else {
                        continue;
                    };
                    if self.frame.len() >= MAX_FRAME_BODY {
                        warn!(max = MAX_FRAME_BODY, "frame too long, discarding");
                        self.clear();
                        self.discarding = true;
                        continue;
                    }
                    self.frame.put_u8(byte);
                }
            }
        }
        None
    }

    /// Bytes buffered for the frame in progress.
    pub fn pending(&self) -> usize {
        self.frame.len()
    }

    /// Drop any partially received frame.
    pub fn clear(&mut self) {
        self.frame.clear();
        self.unescaper.reset();
        self.discarding = false;
    }
}

#[cfg(feature = "async")]
pub use self::async_codec::AshCodec;

#[cfg(feature = "async")]
mod async_codec {
    use bytes::{Bytes, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{AshDecoder, Decoded};
    use crate::error::AshError;
    use crate::frame::{encode_frame, FrameKind};

    /// `tokio_util` codec over [`AshDecoder`] and [`encode_frame`].
    ///
    /// Encodes `(kind, data)` pairs; DATA payloads are randomized when the
    /// codec was built with randomization enabled.
    #[derive(Debug)]
    pub struct AshCodec {
        decoder: AshDecoder,
        randomize: bool,
    }

    impl AshCodec {
        pub fn new(randomize: bool) -> Self {
            Self {
                decoder: AshDecoder::new(),
                randomize,
            }
        }
    }

    impl Default for AshCodec {
        fn default() -> Self {
            Self::new(true)
        }
    }

    impl Decoder for AshCodec {
        type Item = Decoded;
        type Error = AshError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, AshError> {
            Ok(self.decoder.decode(src))
        }
    }

    impl Encoder<(FrameKind, Bytes)> for AshCodec {
        type Error = AshError;

        fn encode(&mut self, item: (FrameKind, Bytes), dst: &mut BytesMut) -> Result<(), AshError> {
            let (kind, data) = item;
            encode_frame(&kind, &data, self.randomize, dst)
        }
    }
}
