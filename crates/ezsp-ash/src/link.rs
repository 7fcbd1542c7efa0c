//! Sans-io ASH link state machine.
//!
//! [`AshLink`] owns sequencing, acknowledgement, retransmission and reset
//! handling but performs no I/O. Callers feed it received bytes and the
//! current time, then drain outbound bytes with
//! [`take_outbound`](AshLink::take_outbound) and upward events with
//! [`poll_event`](AshLink::poll_event).

use std::collections::VecDeque;
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{AshDecoder, Decoded};
use crate::config::AshConfig;
use crate::error::{AshError, Result};
use crate::escape::CANCEL;
use crate::frame::{encode_frame, FrameKind, LinkFrame, ResetCode, ASH_VERSION, MAX_DATA_FIELD};

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// RST sent, waiting for RSTACK.
    Resetting,
    Connected,
    /// Unrecoverable error; a new reset is required.
    Failed,
}

/// Contents of the RSTACK that established the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetInfo {
    pub version: u8,
    pub code: ResetCode,
}

/// Something the link reports upward.
#[derive(Debug)]
pub enum LinkEvent {
    /// RSTACK received; the link is connected.
    Connected(ResetInfo),
    /// In-order DATA payload, derandomized.
    Data(Bytes),
    /// The link failed and will not recover without a reset.
    Failed(AshError),
}

#[derive(Debug)]
struct InFlight {
    frm_num: u8,
    payload: Bytes,
    retries: u8,
    deadline: Instant,
}

fn next_seq(n: u8) -> u8 {
    (n + 1) & 0x07
}

/// ASH ARQ engine.
#[derive(Debug)]
pub struct AshLink {
    config: AshConfig,
    state: LinkState,
    decoder: AshDecoder,
    inbound: BytesMut,
    outbound: BytesMut,
    events: VecDeque<LinkEvent>,
    /// Frame number for the next new DATA frame.
    frm_tx: u8,
    /// Oldest of our frames not yet acknowledged.
    ack_rx: u8,
    /// Next frame number expected from the NCP.
    frm_rx: u8,
    rejecting: bool,
    paused: bool,
    tx_queue: VecDeque<Bytes>,
    in_flight: VecDeque<InFlight>,
    reset_deadline: Option<Instant>,
}

impl AshLink {
    pub fn new(config: AshConfig) -> Self {
        Self {
            config,
            state: LinkState::Disconnected,
            decoder: AshDecoder::new(),
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            events: VecDeque::new(),
            frm_tx: 0,
            ack_rx: 0,
            frm_rx: 0,
            rejecting: false,
            paused: false,
            tx_queue: VecDeque::new(),
            in_flight: VecDeque::new(),
            reset_deadline: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn config(&self) -> &AshConfig {
        &self.config
    }

    /// DATA frames sent and not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Payloads waiting for a free window slot.
    pub fn queued(&self) -> usize {
        self.tx_queue.len()
    }

    /// True between XOFF and XON.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Start (or restart) the link: queue CANCEL + RST and wait for RSTACK.
    pub fn reset(&mut self, now: Instant) {
        self.clear_session();
        self.decoder.clear();
        self.inbound.clear();
        self.outbound.put_u8(CANCEL);
        self.write_frame(FrameKind::Reset, &[]);
        self.state = LinkState::Resetting;
        self.reset_deadline = Some(now + self.config.reset_timeout);
        info!("sent RST, waiting for RSTACK");
    }

    /// Queue an EZSP frame for transmission as DATA.
    pub fn send(&mut self, payload: Bytes, now: Instant) -> Result<()> {
        if self.state != LinkState::Connected {
            return Err(AshError::NotConnected);
        }
        let max = self.config.max_payload.min(MAX_DATA_FIELD);
        if payload.len() > max {
            return Err(AshError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        self.tx_queue.push_back(payload);
        self.pump(now);
        Ok(())
    }

    /// Feed bytes read from the serial stream.
    pub fn receive(&mut self, bytes: &[u8], now: Instant) {
        if matches!(self.state, LinkState::Disconnected | LinkState::Failed) {
            trace!(len = bytes.len(), state = ?self.state, "ignoring inbound bytes");
            return;
        }
        self.inbound.extend_from_slice(bytes);
        while let Some(item) = self.decoder.decode(&mut self.inbound) {
            match item {
                Decoded::Xoff => {
                    debug!("XOFF received, pausing DATA transmission");
                    self.paused = true;
                }
                Decoded::Xon => self.on_xon(now),
                Decoded::Frame(frame) => self.on_frame(&frame, now),
            }
            if self.state == LinkState::Failed {
                self.inbound.clear();
                break;
            }
        }
    }

    /// Fire expired reset and retransmission timers.
    pub fn poll_timers(&mut self, now: Instant) {
        match self.state {
            LinkState::Resetting => {
                if let Some(deadline) = self.reset_deadline {
                    if now >= deadline {
                        self.fail(AshError::ResetTimeout(self.config.reset_timeout));
                    }
                }
            }
            LinkState::Connected if !self.paused => self.retransmit_expired(now),
            _ => {}
        }
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            LinkState::Resetting => self.reset_deadline,
            LinkState::Connected if !self.paused => {
                self.in_flight.iter().map(|f| f.deadline).min()
            }
            _ => None,
        }
    }

    /// Bytes to write to the serial stream, if any.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if self.outbound.is_empty() {
            return None;
        }
        Some(self.outbound.split().freeze())
    }

    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }

    /// Drop all session state and go to DISCONNECTED.
    pub fn close(&mut self) {
        if self.state != LinkState::Disconnected {
            info!(
                in_flight = self.in_flight.len(),
                queued = self.tx_queue.len(),
                "closing ASH link"
            );
        }
        self.clear_session();
        self.decoder.clear();
        self.inbound.clear();
        self.outbound.clear();
        self.state = LinkState::Disconnected;
    }

    fn clear_session(&mut self) {
        self.frm_tx = 0;
        self.ack_rx = 0;
        self.frm_rx = 0;
        self.rejecting = false;
        self.paused = false;
        self.tx_queue.clear();
        self.in_flight.clear();
        self.reset_deadline = None;
    }

    fn fail(&mut self, err: AshError) {
        warn!(error = %err, "ASH link failed");
        self.clear_session();
        self.state = LinkState::Failed;
        self.events.push_back(LinkEvent::Failed(err));
    }

    fn write_frame(&mut self, kind: FrameKind, data: &[u8]) {
        trace!(%kind, "sending frame");
        if let Err(err) = encode_frame(&kind, data, self.config.randomize, &mut self.outbound) {
            error!(%kind, error = %err, "failed to encode frame");
        }
    }

    fn write_data(&mut self, frm_num: u8, re_tx: bool, payload: &[u8]) {
        let kind = FrameKind::Data {
            frm_num,
            re_tx,
            ack_num: self.frm_rx,
        };
        self.write_frame(kind, payload);
    }

    fn write_ack(&mut self) {
        self.write_frame(
            FrameKind::Ack {
                ack_num: self.frm_rx,
                n_rdy: false,
            },
            &[],
        );
    }

    /// Move queued payloads into free window slots.
    fn pump(&mut self, now: Instant) {
        if self.paused || self.state != LinkState::Connected {
            return;
        }
        while self.in_flight.len() < self.config.window() {
            let Some(payload) = self.tx_queue.pop_front() else {
                break;
            };
            let frm_num = self.frm_tx;
            self.frm_tx = next_seq(frm_num);
            self.write_data(frm_num, false, &payload);
            self.in_flight.push_back(InFlight {
                frm_num,
                payload,
                retries: 0,
                deadline: now + self.config.ack_timeout_for(0),
            });
        }
    }

    fn on_xon(&mut self, now: Instant) {
        if self.paused {
            debug!("XON received, resuming DATA transmission");
            self.paused = false;
            let config = &self.config;
            for frame in self.in_flight.iter_mut() {
                frame.deadline = now + config.ack_timeout_for(frame.retries);
            }
        }
        self.pump(now);
    }

    fn on_frame(&mut self, frame: &LinkFrame, now: Instant) {
        let kind = frame.kind();
        if kind == FrameKind::Invalid {
            debug!(len = frame.wire_len(), "discarding invalid frame");
            return;
        }
        if !frame.verify_crc() {
            debug!(%kind, "discarding frame with bad CRC");
            return;
        }
        trace!(%kind, "frame received");

        match kind {
            FrameKind::ResetAck { version, code } => self.on_reset_ack(version, code),
            FrameKind::Error { version, code } => self.fail(AshError::NcpError { version, code }),
            FrameKind::Reset => debug!("ignoring RST from NCP"),
            FrameKind::Ack { ack_num, .. } if self.state == LinkState::Connected => {
                self.on_ack(ack_num);
                self.pump(now);
            }
            FrameKind::Nak { ack_num, .. } if self.state == LinkState::Connected => {
                self.on_ack(ack_num);
                self.on_nak(now);
                self.pump(now);
            }
            FrameKind::Data {
                frm_num,
                re_tx,
                ack_num,
            } if self.state == LinkState::Connected => {
                self.on_ack(ack_num);
                self.on_data(frm_num, re_tx, frame);
                self.pump(now);
            }
            _ => trace!(%kind, state = ?self.state, "ignoring frame"),
        }
    }

    fn on_reset_ack(&mut self, version: u8, code: ResetCode) {
        match self.state {
            LinkState::Resetting => {
                if version != ASH_VERSION {
                    self.fail(AshError::UnsupportedVersion(version));
                    return;
                }
                self.clear_session();
                self.state = LinkState::Connected;
                info!(version, %code, "ASH link connected");
                self.events
                    .push_back(LinkEvent::Connected(ResetInfo { version, code }));
            }
            LinkState::Connected => self.fail(AshError::UnexpectedReset(code)),
            state => debug!(%code, ?state, "ignoring RSTACK"),
        }
    }

    /// Release held frames in `[ack_rx, ack_num)`.
    fn on_ack(&mut self, ack_num: u8) {
        let acked = ack_num.wrapping_sub(self.ack_rx) & 0x07;
        if usize::from(acked) > self.in_flight.len() {
            warn!(
                ack_num,
                ack_rx = self.ack_rx,
                in_flight = self.in_flight.len(),
                "acknowledgement outside the window"
            );
            return;
        }
        for _ in 0..acked {
            self.in_flight.pop_front();
        }
        self.ack_rx = ack_num;
    }

    /// Go back to the oldest unacknowledged frame and resend everything held.
    fn on_nak(&mut self, now: Instant) {
        if self.paused || self.in_flight.is_empty() {
            return;
        }
        debug!(
            from = self.ack_rx,
            count = self.in_flight.len(),
            "NAK received, retransmitting"
        );
        let config = &self.config;
        let resend: Vec<(u8, Bytes)> = self
            .in_flight
            .iter_mut()
            .map(|frame| {
                frame.deadline = now + config.ack_timeout_for(frame.retries);
                (frame.frm_num, frame.payload.clone())
            })
            .collect();
        for (frm_num, payload) in resend {
            self.write_data(frm_num, true, &payload);
        }
    }

    fn on_data(&mut self, frm_num: u8, re_tx: bool, frame: &LinkFrame) {
        if frm_num == self.frm_rx {
            self.rejecting = false;
            self.frm_rx = next_seq(frm_num);
            self.write_ack();
            let payload = frame.payload(self.config.randomize);
            trace!(frm_num, len = payload.len(), "delivering DATA");
            self.events.push_back(LinkEvent::Data(payload));
        } else if self.is_duplicate(frm_num) {
            debug!(frm_num, re_tx, "duplicate DATA frame, acknowledging again");
            self.write_ack();
        } else if !self.rejecting {
            debug!(
                frm_num,
                expected = self.frm_rx,
                "out of sequence DATA frame, sending NAK"
            );
            self.rejecting = true;
            self.write_frame(
                FrameKind::Nak {
                    ack_num: self.frm_rx,
                    n_rdy: false,
                },
                &[],
            );
        } else {
            trace!(frm_num, "still rejecting");
        }
    }

    fn is_duplicate(&self, frm_num: u8) -> bool {
        let behind = usize::from(self.frm_rx.wrapping_sub(frm_num) & 0x07);
        (1..=self.config.window()).contains(&behind)
    }

    fn retransmit_expired(&mut self, now: Instant) {
        for index in 0..self.in_flight.len() {
            let frame = &mut self.in_flight[index];
            if frame.deadline > now {
                continue;
            }
            if frame.retries >= self.config.max_retransmits {
                let err = AshError::RetryLimitExceeded {
                    frame: frame.frm_num,
                    attempts: frame.retries,
                };
                self.fail(err);
                return;
            }
            frame.retries += 1;
            frame.deadline = now + self.config.ack_timeout_for(frame.retries);
            let (frm_num, retries, payload) = (frame.frm_num, frame.retries, frame.payload.clone());
            debug!(frm_num, retries, "acknowledgement timeout, retransmitting");
            self.write_data(frm_num, true, &payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ncp_frame(kind: FrameKind, data: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        encode_frame(&kind, data, true, &mut dst).unwrap();
        dst.to_vec()
    }

    fn rstack(version: u8, code: ResetCode) -> Vec<u8> {
        ncp_frame(FrameKind::ResetAck { version, code }, &[])
    }

    fn sent_frames(link: &mut AshLink) -> Vec<LinkFrame> {
        let Some(bytes) = link.take_outbound() else {
            return Vec::new();
        };
        let mut decoder = AshDecoder::new();
        let mut src = BytesMut::from(bytes.as_ref());
        let mut frames = Vec::new();
        while let Some(item) = decoder.decode(&mut src) {
            if let Decoded::Frame(frame) = item {
                assert!(frame.verify_crc());
                frames.push(frame);
            }
        }
        frames
    }

    fn sent_kinds(link: &mut AshLink) -> Vec<FrameKind> {
        sent_frames(link).iter().map(LinkFrame::kind).collect()
    }

    fn data(frm_num: u8, re_tx: bool, ack_num: u8) -> FrameKind {
        FrameKind::Data {
            frm_num,
            re_tx,
            ack_num,
        }
    }

    fn ack(ack_num: u8) -> FrameKind {
        FrameKind::Ack {
            ack_num,
            n_rdy: false,
        }
    }

    fn connected(config: AshConfig, now: Instant) -> AshLink {
        let mut link = AshLink::new(config);
        link.reset(now);
        let _ = link.take_outbound();
        link.receive(&rstack(2, ResetCode::Software), now);
        assert!(matches!(link.poll_event(), Some(LinkEvent::Connected(_))));
        link
    }

    #[test]
    fn test_reset_sends_cancel_and_rst() {
        let now = Instant::now();
        let mut link = AshLink::new(AshConfig::default());
        link.reset(now);

        assert_eq!(link.state(), LinkState::Resetting);
        let out = link.take_outbound().unwrap();
        assert_eq!(out.as_ref(), &[0x1A, 0xC0, 0x38, 0xBC, 0x7E]);
        assert_eq!(link.next_deadline(), Some(now + Duration::from_millis(2500)));
    }

    #[test]
    fn test_rstack_connects() {
        let now = Instant::now();
        let mut link = AshLink::new(AshConfig::default());
        link.reset(now);
        link.receive(&[0xC1, 0x02, 0x0B, 0x0A, 0x52, 0x7E], now);

        assert_eq!(link.state(), LinkState::Connected);
        match link.poll_event() {
            Some(LinkEvent::Connected(info)) => {
                assert_eq!(info.version, 2);
                assert_eq!(info.code, ResetCode::Software);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(link.next_deadline(), None);
    }

    #[test]
    fn test_reset_timeout_fails() {
        let now = Instant::now();
        let mut link = AshLink::new(AshConfig::default());
        link.reset(now);

        link.poll_timers(now + Duration::from_millis(2499));
        assert_eq!(link.state(), LinkState::Resetting);

        link.poll_timers(now + Duration::from_millis(2500));
        assert_eq!(link.state(), LinkState::Failed);
        assert!(matches!(
            link.poll_event(),
            Some(LinkEvent::Failed(AshError::ResetTimeout(_)))
        ));
    }

    #[test]
    fn test_unsupported_version_fails() {
        let now = Instant::now();
        let mut link = AshLink::new(AshConfig::default());
        link.reset(now);
        link.receive(&rstack(3, ResetCode::PowerOn), now);

        assert_eq!(link.state(), LinkState::Failed);
        assert!(matches!(
            link.poll_event(),
            Some(LinkEvent::Failed(AshError::UnsupportedVersion(3)))
        ));
    }

    #[test]
    fn test_send_requires_connection() {
        let mut link = AshLink::new(AshConfig::default());
        let err = link
            .send(Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]), Instant::now())
            .unwrap_err();
        assert!(matches!(err, AshError::NotConnected));
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        let err = link.send(Bytes::from(vec![0u8; 129]), now).unwrap_err();
        assert!(matches!(err, AshError::PayloadTooLarge { size: 129, max: 128 }));
    }

    #[test]
    fn test_send_emits_randomized_data() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]), now)
            .unwrap();

        let out = link.take_outbound().unwrap();
        assert_eq!(out.as_ref(), &[0x00, 0x42, 0x21, 0xA8, 0x56, 0x8D, 0xEA, 0x7E]);
        let frame = LinkFrame::classify(out);
        assert_eq!(frame.kind(), data(0, false, 0));
        assert_eq!(frame.payload(true).as_ref(), &[0x00, 0x00, 0x00, 0x02]);
        assert_eq!(link.in_flight(), 1);
    }

    #[test]
    fn test_window_limits_in_flight_frames() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        for i in 0..4u8 {
            link.send(Bytes::from(vec![i, 0x00, 0x00]), now).unwrap();
        }

        assert_eq!(
            sent_kinds(&mut link),
            vec![data(0, false, 0), data(1, false, 0), data(2, false, 0)]
        );
        assert_eq!(link.in_flight(), 3);
        assert_eq!(link.queued(), 1);

        link.receive(&ncp_frame(ack(1), &[]), now);
        assert_eq!(sent_kinds(&mut link), vec![data(3, false, 0)]);
        assert_eq!(link.in_flight(), 3);
        assert_eq!(link.queued(), 0);

        link.receive(&ncp_frame(ack(4), &[]), now);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn test_ack_outside_window_is_ignored() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        let _ = link.take_outbound();

        link.receive(&ncp_frame(ack(5), &[]), now);
        assert_eq!(link.in_flight(), 1);
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn test_timeout_retransmits_with_backoff() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        let _ = link.take_outbound();

        link.poll_timers(now + Duration::from_millis(799));
        assert!(link.take_outbound().is_none());

        let first = now + Duration::from_millis(800);
        link.poll_timers(first);
        assert_eq!(sent_kinds(&mut link), vec![data(0, true, 0)]);
        assert_eq!(link.next_deadline(), Some(first + Duration::from_millis(1600)));
    }

    #[test]
    fn test_retry_limit_fails_link() {
        let now = Instant::now();
        let config = AshConfig {
            max_retransmits: 2,
            ..AshConfig::default()
        };
        let mut link = connected(config, now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();

        let mut t = now;
        for _ in 0..2 {
            t = link.next_deadline().unwrap();
            link.poll_timers(t);
            assert_eq!(link.state(), LinkState::Connected);
        }
        t = link.next_deadline().unwrap_or(t);
        link.poll_timers(t);

        assert_eq!(link.state(), LinkState::Failed);
        assert!(matches!(
            link.poll_event(),
            Some(LinkEvent::Failed(AshError::RetryLimitExceeded {
                frame: 0,
                attempts: 2
            }))
        ));
    }

    #[test]
    fn test_nak_retransmits_from_named_frame() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        for i in 0..3u8 {
            link.send(Bytes::from(vec![i, 0x00, 0x00]), now).unwrap();
        }
        let _ = link.take_outbound();

        link.receive(
            &ncp_frame(
                FrameKind::Nak {
                    ack_num: 1,
                    n_rdy: false,
                },
                &[],
            ),
            now,
        );

        let frames = sent_frames(&mut link);
        let kinds: Vec<FrameKind> = frames.iter().map(LinkFrame::kind).collect();
        assert_eq!(kinds, vec![data(1, true, 0), data(2, true, 0)]);
        assert_eq!(frames[0].payload(true).as_ref(), &[0x01, 0x00, 0x00]);
        assert_eq!(link.in_flight(), 2);
    }

    #[test]
    fn test_inbound_data_is_acked_and_delivered() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.receive(&ncp_frame(data(0, false, 0), &[0x00, 0x80, 0x00, 0x02]), now);

        match link.poll_event() {
            Some(LinkEvent::Data(payload)) => {
                assert_eq!(payload.as_ref(), &[0x00, 0x80, 0x00, 0x02]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(sent_kinds(&mut link), vec![ack(1)]);
    }

    #[test]
    fn test_duplicate_data_is_reacked_not_redelivered() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        let frame = ncp_frame(data(0, false, 0), &[0x00, 0x80, 0x00, 0x02]);
        link.receive(&frame, now);
        assert!(matches!(link.poll_event(), Some(LinkEvent::Data(_))));
        let _ = link.take_outbound();

        link.receive(&ncp_frame(data(0, true, 0), &[0x00, 0x80, 0x00, 0x02]), now);
        assert!(link.poll_event().is_none());
        assert_eq!(sent_kinds(&mut link), vec![ack(1)]);
    }

    #[test]
    fn test_out_of_order_data_sends_single_nak() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        let nak = FrameKind::Nak {
            ack_num: 0,
            n_rdy: false,
        };

        link.receive(&ncp_frame(data(2, false, 0), &[0x02, 0x80, 0x00]), now);
        assert!(link.poll_event().is_none());
        assert_eq!(sent_kinds(&mut link), vec![nak]);

        link.receive(&ncp_frame(data(3, false, 0), &[0x03, 0x80, 0x00]), now);
        assert!(link.take_outbound().is_none());

        link.receive(&ncp_frame(data(0, true, 0), &[0x00, 0x80, 0x00]), now);
        assert!(matches!(link.poll_event(), Some(LinkEvent::Data(_))));
        assert_eq!(sent_kinds(&mut link), vec![ack(1)]);
    }

    #[test]
    fn test_piggybacked_ack_releases_frames() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        let _ = link.take_outbound();

        link.receive(&ncp_frame(data(0, false, 1), &[0x01, 0x80, 0x00]), now);
        assert_eq!(link.in_flight(), 0);
        assert_eq!(link.next_deadline(), None);
    }

    #[test]
    fn test_xoff_pauses_and_xon_resumes() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.receive(&[0x13], now);
        assert!(link.is_paused());

        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        assert!(link.take_outbound().is_none());
        assert_eq!(link.next_deadline(), None);

        let later = now + Duration::from_secs(5);
        link.receive(&[0x11], later);
        assert!(!link.is_paused());
        assert_eq!(sent_kinds(&mut link), vec![data(0, false, 0)]);
        assert_eq!(link.next_deadline(), Some(later + Duration::from_millis(800)));
    }

    #[test]
    fn test_xoff_holds_retransmission_timers() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        let _ = link.take_outbound();

        link.receive(&[0x13], now);
        link.poll_timers(now + Duration::from_secs(10));
        assert!(link.take_outbound().is_none());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn test_rstack_while_connected_is_fatal() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.receive(&rstack(2, ResetCode::Watchdog), now);

        assert_eq!(link.state(), LinkState::Failed);
        assert!(matches!(
            link.poll_event(),
            Some(LinkEvent::Failed(AshError::UnexpectedReset(ResetCode::Watchdog)))
        ));
    }

    #[test]
    fn test_error_frame_is_fatal() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.receive(&[0xC2, 0x02, 0x51, 0xA8, 0xBD, 0x7E], now);

        assert!(matches!(
            link.poll_event(),
            Some(LinkEvent::Failed(AshError::NcpError {
                version: 2,
                code: ResetCode::ExceededMaximumAckTimeoutCount
            }))
        ));
        assert!(link.send(Bytes::from_static(&[0x00, 0x00, 0x00]), now).is_err());
    }

    #[test]
    fn test_ncp_rst_is_ignored() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.receive(&[0xC0, 0x38, 0xBC, 0x7E], now);
        assert_eq!(link.state(), LinkState::Connected);
        assert!(link.poll_event().is_none());
    }

    #[test]
    fn test_bad_crc_is_discarded() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        let mut frame = ncp_frame(data(0, false, 0), &[0x00, 0x80, 0x00, 0x02]);
        let crc_pos = frame.len() - 2;
        frame[crc_pos] ^= 0x01;
        link.receive(&frame, now);

        assert!(link.poll_event().is_none());
        assert!(link.take_outbound().is_none());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn test_close_disconnects() {
        let now = Instant::now();
        let mut link = connected(AshConfig::default(), now);
        link.send(Bytes::from_static(&[0x01, 0x00, 0x00]), now)
            .unwrap();
        link.close();

        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(link.in_flight(), 0);
        assert!(link.take_outbound().is_none());
        link.receive(&rstack(2, ResetCode::PowerOn), now);
        assert!(link.poll_event().is_none());
    }
}
