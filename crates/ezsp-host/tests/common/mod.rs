//! In-process NCP simulator speaking ASH over a Unix socket pair.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use ezsp_ash::{encode_frame, AshDecoder, Decoded, FrameKind, LinkFrame, ResetCode};
use ezsp_host::{Ezsp, EzspConfig};
use ezsp_transport::SerialStream;

pub const WAIT: Duration = Duration::from_secs(5);

/// One EZSP command as the NCP received it.
#[derive(Debug, Clone)]
pub struct Command {
    pub sequence: u8,
    pub frame_id: u16,
    pub params: Vec<u8>,
    pub raw: Vec<u8>,
}

impl Command {
    /// Parse a command body sent at protocol `version`.
    fn parse(body: &[u8], version: u8) -> Self {
        assert!(body.len() >= 3, "command body too short: {body:02X?}");
        let (frame_id, params_at) = if version >= 8 && body[2] & 0x03 == 0x01 {
            (u16::from_le_bytes([body[3], body[4]]), 5)
        } else if body[2] == 0xFF {
            (u16::from(body[4]), 5)
        } else {
            (u16::from(body[2]), 3)
        };
        Self {
            sequence: body[0],
            frame_id,
            params: body[params_at..].to_vec(),
            raw: body.to_vec(),
        }
    }
}

/// Extended-format response to `sequence`.
pub fn response(sequence: u8, frame_id: u16, params: &[u8]) -> Vec<u8> {
    let [lo, hi] = frame_id.to_le_bytes();
    let mut body = vec![sequence, 0x80, 0x01, lo, hi];
    body.extend_from_slice(params);
    body
}

/// Extended-format asynchronous callback.
pub fn callback(frame_id: u16, params: &[u8]) -> Vec<u8> {
    let [lo, hi] = frame_id.to_le_bytes();
    let mut body = vec![0x00, 0x90, 0x01, lo, hi];
    body.extend_from_slice(params);
    body
}

pub struct FakeNcp {
    stream: UnixStream,
    decoder: AshDecoder,
    buf: BytesMut,
    /// Next frame number expected from the host.
    rx_next: u8,
    /// Frame number of our next DATA frame.
    tx_next: u8,
    /// Protocol version the host encodes commands with.
    version: u8,
}

impl FakeNcp {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            decoder: AshDecoder::new(),
            buf: BytesMut::new(),
            rx_next: 0,
            tx_next: 0,
            version: 8,
        }
    }

    /// Expect commands in the header format of `version` from now on.
    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    /// Next frame from the host, or `None` on timeout or EOF.
    fn read_frame(&mut self, timeout: Duration) -> Option<LinkFrame> {
        self.stream
            .set_read_timeout(Some(timeout))
            .expect("read timeout should be settable");
        loop {
            while let Some(item) = self.decoder.decode(&mut self.buf) {
                if let Decoded::Frame(frame) = item {
                    return Some(frame);
                }
            }
            let mut chunk = [0u8; 256];
            match self.stream.read(&mut chunk) {
                Ok(0) => return None,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return None
                }
                Err(_) => return None,
            }
        }
    }

    fn send(&mut self, kind: FrameKind, data: &[u8]) {
        let mut out = BytesMut::new();
        encode_frame(&kind, data, true, &mut out).expect("frame should encode");
        // The host may already be gone in shutdown tests.
        let _ = self.stream.write_all(&out);
    }

    pub fn accept_reset(&mut self) {
        let frame = self.read_frame(WAIT).expect("host should send RST");
        assert_eq!(frame.kind(), FrameKind::Reset);
        self.send(
            FrameKind::ResetAck {
                version: 2,
                code: ResetCode::Software,
            },
            &[],
        );
    }

    fn ack(&mut self) {
        self.send(
            FrameKind::Ack {
                ack_num: self.rx_next,
                n_rdy: false,
            },
            &[],
        );
    }

    /// Next new command, ACKing every DATA frame on the way.
    pub fn next_command_within(&mut self, timeout: Duration) -> Option<Command> {
        loop {
            let frame = self.read_frame(timeout)?;
            let FrameKind::Data { frm_num, .. } = frame.kind() else {
                continue;
            };
            if frm_num != self.rx_next {
                // Retransmission of a frame we already have.
                self.ack();
                continue;
            }
            self.rx_next = (frm_num + 1) & 0x07;
            self.ack();
            return Some(Command::parse(&frame.payload(true), self.version));
        }
    }

    pub fn next_command(&mut self) -> Command {
        self.next_command_within(WAIT)
            .expect("host should send a command")
    }

    /// Send an EZSP frame in a DATA frame.
    pub fn send_frame(&mut self, body: &[u8]) {
        let kind = FrameKind::Data {
            frm_num: self.tx_next,
            re_tx: false,
            ack_num: self.rx_next,
        };
        self.tx_next = (self.tx_next + 1) & 0x07;
        self.send(kind, body);
    }

    pub fn send_error(&mut self, code: ResetCode) {
        self.send(FrameKind::Error { version: 2, code }, &[]);
    }

    /// Keep ACKing until the host closes the stream.
    pub fn wait_for_close(&mut self) {
        while self.next_command_within(WAIT).is_some() {}
    }
}

pub fn test_config() -> EzspConfig {
    EzspConfig {
        command_timeout: Duration::from_secs(2),
        watchdog_period: None,
        ..EzspConfig::default()
    }
}

/// Start a host against a simulated NCP running `script` on its own thread.
pub fn start<F>(config: EzspConfig, script: F) -> (Ezsp, JoinHandle<()>)
where
    F: FnOnce(&mut FakeNcp) + Send + 'static,
{
    let (host, ncp) = UnixStream::pair().expect("socket pair should be created");
    let handle = thread::spawn(move || {
        let mut ncp = FakeNcp::new(ncp);
        ncp.accept_reset();
        script(&mut ncp);
    });
    let ezsp = Ezsp::from_stream(SerialStream::from_unix(host), config)
        .expect("host should connect to the simulated NCP");
    (ezsp, handle)
}
