//! FIFO admission of logical transactions.
//!
//! Each caller draws a ticket and waits until the queue is serving it, so
//! transactions submitted to one database run one after another in arrival
//! order. The thread holding the current turn is recorded: when it asks
//! for admission again it joins the running transaction instead of waiting
//! behind itself.

use log::trace;
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct QueueState {
    next_ticket: u64,
    serving: u64,
    owner: Option<ThreadId>,
}

#[derive(Debug, Default)]
pub struct AdmissionQueue {
    state: Mutex<QueueState>,
    turn: Condvar,
}

/// Outcome of [`AdmissionQueue::admit`].
#[derive(Debug)]
pub enum Admission<'q> {
    /// The calling thread already holds the turn.
    Joined,
    /// The caller holds the turn until the guard is dropped.
    Admitted(AdmissionGuard<'q>),
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until it is the caller's turn, unless the calling thread
    /// already holds it.
    pub fn admit(&self) -> Admission<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            return Admission::Joined;
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        while state.serving != ticket {
            self.turn.wait(&mut state);
        }
        state.owner = Some(me);
        trace!("AdmissionQueue: ticket {} admitted", ticket);
        Admission::Admitted(AdmissionGuard {
            queue: self,
            ticket,
        })
    }

    pub fn held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Tickets drawn and not yet released, including the one being served.
    pub fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.next_ticket - state.serving
    }

    fn release(&self, ticket: u64) {
        let mut state = self.state.lock();
        state.owner = None;
        state.serving += 1;
        trace!("AdmissionQueue: ticket {} released", ticket);
        self.turn.notify_all();
    }
}

/// The current turn. Dropping it hands the queue to the next ticket, also
/// when the holder is unwinding.
#[derive(Debug)]
pub struct AdmissionGuard<'q> {
    queue: &'q AdmissionQueue,
    ticket: u64,
}

impl AdmissionGuard<'_> {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.queue.release(self.ticket);
    }
}
