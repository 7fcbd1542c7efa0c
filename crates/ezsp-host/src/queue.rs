use std::sync::{Condvar, Mutex};

use crate::error::{EzspError, Result};
use crate::lock;

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
    closed: bool,
}

/// FIFO gate allowing one command in flight at a time.
///
/// Callers are served in the order they called [`enter`](Self::enter).
#[derive(Debug, Default)]
pub struct SingleFlight {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for this caller's turn. Fails with `Cancelled` once closed.
    pub fn enter(&self) -> Result<Turn<'_>> {
        let mut tickets = lock(&self.tickets);
        if tickets.closed {
            return Err(EzspError::Cancelled);
        }
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if tickets.closed {
            tickets.serving += 1;
            self.turn.notify_all();
            return Err(EzspError::Cancelled);
        }
        Ok(Turn { gate: self })
    }

    /// Refuse new callers and cancel those still queued.
    pub fn close(&self) {
        lock(&self.tickets).closed = true;
        self.turn.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tickets).closed
    }
}

/// Held while a command is in flight; dropping it admits the next caller.
#[derive(Debug)]
pub struct Turn<'a> {
    gate: &'a SingleFlight,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        lock(&self.gate.tickets).serving += 1;
        self.gate.turn.notify_all();
    }
}
