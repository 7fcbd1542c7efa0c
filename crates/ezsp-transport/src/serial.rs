use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::options::SerialOptions;
use crate::stream::SerialStream;

/// Prefix selecting a serial-over-TCP bridge instead of a local device.
pub const TCP_PREFIX: &str = "tcp://";

/// Open the NCP transport at `path`.
///
/// `tcp://host:port` connects to a TCP serial bridge; anything else is
/// treated as a serial device name.
pub fn open(path: &str, options: &SerialOptions) -> Result<SerialStream> {
    let mut stream = match parse_tcp_path(path) {
        Some(address) => open_tcp(&address, options)?,
        None => open_serial(path, options)?,
    };
    stream.set_read_timeout(Some(options.read_timeout))?;
    Ok(stream)
}

/// Extract `host:port` from a `tcp://host:port` path.
///
/// Returns `None` when the path does not use the TCP scheme.
pub fn parse_tcp_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix(TCP_PREFIX)?;
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_string())
}

fn open_tcp(address: &str, options: &SerialOptions) -> Result<SerialStream> {
    let resolved = address
        .to_socket_addrs()
        .map_err(|_| TransportError::InvalidAddress(address.to_string()))?
        .next()
        .ok_or_else(|| TransportError::InvalidAddress(address.to_string()))?;

    let stream = TcpStream::connect_timeout(&resolved, options.connect_timeout).map_err(|e| {
        TransportError::Connect {
            address: address.to_string(),
            source: e,
        }
    })?;
    stream.set_nodelay(true)?;

    info!(%address, "connected to tcp serial bridge");
    Ok(SerialStream::from_tcp(stream))
}

fn open_serial(path: &str, options: &SerialOptions) -> Result<SerialStream> {
    let flow_control = if options.rtscts {
        serialport::FlowControl::Hardware
    } else {
        serialport::FlowControl::None
    };

    let port = serialport::new(path, options.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(flow_control)
        .timeout(options.read_timeout)
        .open()
        .map_err(|e| TransportError::Open {
            path: PathBuf::from(path),
            source: e,
        })?;

    info!(
        path,
        baud_rate = options.baud_rate,
        rtscts = options.rtscts,
        "opened serial device"
    );
    Ok(SerialStream::from_serial(port))
}

/// A serial port discovered on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name usable as an `open` path.
    pub name: String,
    /// Port kind ("usb", "pci", "bluetooth", "unknown").
    pub kind: &'static str,
    /// USB vendor id, when known.
    pub vid: Option<u16>,
    /// USB product id, when known.
    pub pid: Option<u16>,
    /// USB manufacturer string, when known.
    pub manufacturer: Option<String>,
    /// USB product string, when known.
    pub product: Option<String>,
}

/// Enumerate serial ports available on this host.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                kind: "usb",
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            other => Self {
                name: info.port_name,
                kind: match other {
                    serialport::SerialPortType::PciPort => "pci",
                    serialport::SerialPortType::BluetoothPort => "bluetooth",
                    _ => "unknown",
                },
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
            },
        }
    }
}
