use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected NCP byte stream implementing `Read` and `Write`.
///
/// This is the handle returned by [`open`](crate::open). It wraps either a
/// serial device or a TCP bridge socket; on Unix a socket pair can also be
/// wrapped for in-process testing.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.read(buf),
            SerialStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.write(buf),
            SerialStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.flush(),
            SerialStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: SerialStreamInner::Serial(port),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: SerialStreamInner::Tcp(stream),
        }
    }

    /// Wrap one end of a Unix socket pair.
    ///
    /// Used to run the full stack against an in-process NCP simulator.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// `None` means "block forever" for sockets. Serial devices always have a
    /// finite timeout, so `None` maps to one hour there.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => {
                let timeout = timeout.unwrap_or(Duration::from_secs(3600));
                port.set_timeout(timeout).map_err(std::io::Error::from)?;
                Ok(())
            }
            SerialStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream so reads and writes can live on different
    /// threads.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SerialStreamInner::Serial(port) => {
                let cloned = port.try_clone().map_err(std::io::Error::from)?;
                Ok(Self::from_serial(cloned))
            }
            SerialStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Close the stream in both directions.
    ///
    /// Sockets are shut down so a reader blocked on a clone wakes up with
    /// EOF. Serial devices are released when the last clone is dropped.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            SerialStreamInner::Serial(_) => Ok(()),
            SerialStreamInner::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            SerialStreamInner::Serial(_) => "serial",
            SerialStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => "unix-socket",
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SerialStreamInner::Serial(port) => f
                .debug_struct("SerialStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            SerialStreamInner::Tcp(stream) => f
                .debug_struct("SerialStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => f
                .debug_struct("SerialStream")
                .field("type", &"unix-socket")
                .finish(),
        }
    }
}
