//! Outstanding calls waiting for a frame from the NCP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ezsp_schema::CommandSchema;
use tracing::trace;

use crate::error::{EzspError, FrameError, FrameFailure, Result};
use crate::frame::EzspFrame;
use crate::lock;

struct Slot {
    id: u64,
    frame_id: u16,
    name: &'static str,
    sequence: Option<u8>,
    tx: SyncSender<Result<EzspFrame>>,
}

impl Slot {
    fn matches(&self, frame_id: u16, sequence: u8) -> bool {
        self.frame_id == frame_id && self.sequence.is_none_or(|s| s == sequence)
    }
}

/// Table of waiters keyed by frame id and, optionally, sequence number.
///
/// Each waiter is resolved at most once. The first registered waiter that
/// matches an inbound frame takes it.
#[derive(Default)]
pub struct PendingCalls {
    slots: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
}

impl PendingCalls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a waiter for `command`'s frame id. `sequence: None` matches
    /// any sequence.
    pub fn register(
        self: &Arc<Self>,
        command: &'static CommandSchema,
        sequence: Option<u8>,
        timeout: Duration,
    ) -> PendingCall {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(1);
        lock(&self.slots).push(Slot {
            id,
            frame_id: command.id,
            name: command.name,
            sequence,
            tx,
        });
        PendingCall {
            table: Arc::clone(self),
            id,
            frame_id: command.id,
            name: command.name,
            sequence,
            timeout,
            rx,
            done: false,
        }
    }

    /// Hand `frame` to the first matching waiter, or give it back.
    pub fn resolve(&self, frame: EzspFrame) -> std::result::Result<(), EzspFrame> {
        let slot = {
            let mut slots = lock(&self.slots);
            match slots
                .iter()
                .position(|slot| slot.matches(frame.frame_id, frame.sequence))
            {
                Some(index) => slots.remove(index),
                None => return Err(frame),
            }
        };
        trace!(name = slot.name, sequence = frame.sequence, "resolved waiter");
        // The receiver may be gone if the waiter timed out concurrently.
        let _ = slot.tx.try_send(Ok(frame));
        Ok(())
    }

    /// Fail the waiter an undecodable frame belongs to, or give the error back.
    ///
    /// `invalidCommand` names no command, so it fails the waiter registered
    /// for its sequence. Any other failure must match a waiter's frame id and
    /// sequence; failed callbacks are never claimed.
    pub fn fail(&self, error: FrameError) -> std::result::Result<(), FrameError> {
        let Some(sequence) = error.sequence else {
            return Err(error);
        };
        let slot = {
            let mut slots = lock(&self.slots);
            let index = if matches!(error.failure, FrameFailure::InvalidCommand(_)) {
                slots.iter().position(|slot| slot.sequence == Some(sequence))
            } else if error.is_callback() {
                None
            } else {
                error.frame_id.and_then(|frame_id| {
                    slots.iter().position(|slot| {
                        slot.frame_id == frame_id && slot.sequence == Some(sequence)
                    })
                })
            };
            match index {
                Some(index) => slots.remove(index),
                None => return Err(error),
            }
        };
        trace!(name = slot.name, sequence, "failed waiter");
        let _ = slot.tx.try_send(Err(EzspError::Frame(error)));
        Ok(())
    }

    /// Fail every waiter with the error `make` builds.
    pub fn fail_all(&self, make: impl Fn() -> EzspError) {
        let slots = std::mem::take(&mut *lock(&self.slots));
        for slot in slots {
            let _ = slot.tx.try_send(Err(make()));
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        lock(&self.slots).retain(|slot| slot.id != id);
    }
}

impl std::fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCalls")
            .field("waiting", &self.len())
            .finish()
    }
}

/// Handle to one registered waiter.
///
/// Dropping the handle unregisters the waiter.
pub struct PendingCall {
    table: Arc<PendingCalls>,
    id: u64,
    frame_id: u16,
    name: &'static str,
    sequence: Option<u8>,
    timeout: Duration,
    rx: Receiver<Result<EzspFrame>>,
    done: bool,
}

impl PendingCall {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn frame_id(&self) -> u16 {
        self.frame_id
    }

    pub fn sequence(&self) -> Option<u8> {
        self.sequence
    }

    /// Block until the frame arrives, the call fails, or the timeout elapses.
    pub fn wait(mut self) -> Result<EzspFrame> {
        let outcome = match self.rx.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                self.table.remove(self.id);
                // Resolution may have raced the removal.
                match self.rx.try_recv() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(EzspError::Timeout {
                        command: self.name,
                        timeout: self.timeout,
                    }),
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(EzspError::Cancelled),
        };
        self.done = true;
        outcome
    }

    /// Unregister without waiting.
    pub fn cancel(self) {}
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if !self.done {
            self.table.remove(self.id);
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("name", &self.name)
            .field("frame_id", &self.frame_id)
            .field("sequence", &self.sequence)
            .field("timeout", &self.timeout)
            .finish()
    }
}
