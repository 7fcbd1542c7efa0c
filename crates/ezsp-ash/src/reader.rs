use std::io::{ErrorKind, Read};

use crate::error::{AshError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Pulls raw bytes from a serial stream for the link to decode.
///
/// The stream is expected to carry a read timeout; a timeout surfaces as
/// `Ok(None)` so the caller can service link timers.
pub struct LinkReader<T> {
    inner: T,
    chunk: [u8; READ_CHUNK_SIZE],
}

impl<T: Read> LinkReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            chunk: [0u8; READ_CHUNK_SIZE],
        }
    }

    /// Read whatever is available (blocking up to the stream's timeout).
    ///
    /// Returns `Err(AshError::ConnectionClosed)` when EOF is reached.
    pub fn read_chunk(&mut self) -> Result<Option<&[u8]>> {
        loop {
            match self.inner.read(&mut self.chunk) {
                Ok(0) => return Err(AshError::ConnectionClosed),
                Ok(n) => return Ok(Some(&self.chunk[..n])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(AshError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
