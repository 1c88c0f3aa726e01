//! Single-capacity handoff between the reader thread and the one caller
//! waiting on a reply.
//!
//! `Idle → Awaiting → Idle`, or `→ Closed` from anywhere. Every transition
//! happens under `inner`; the reply itself travels over a capacity-one
//! channel so the caller never reads shared fields. Each arm gets its own
//! id, and only the holder of that id may return the slot to `Idle`.

use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError, sync_channel};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::LinkError;
use crate::proto::{CommandKind, Response};

enum Delivery {
    Reply(Response),
    Closed,
}

enum State {
    Idle,
    Awaiting {
        id: u64,
        kind: CommandKind,
        deadline: Instant,
        tx: SyncSender<Delivery>,
    },
    Closed,
}

struct Inner {
    state: State,
    next_id: u64,
}

impl Inner {
    fn awaiting(&self, armed: &Armed) -> bool {
        matches!(self.state, State::Awaiting { id, .. } if id == armed.id)
    }
}

/// Observable view of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Awaiting { kind: CommandKind, deadline: Instant },
    Closed,
}

/// What happened to a frame handed to [`PendingSlot::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// Nobody is waiting.
    Unsolicited,
    /// Someone is waiting, but for a different command.
    Mismatched { awaiting: CommandKind },
}

/// Held by the caller between arming the slot and collecting the reply.
pub struct Armed {
    id: u64,
    kind: CommandKind,
    timeout: Duration,
    deadline: Instant,
    rx: Receiver<Delivery>,
}

pub struct PendingSlot {
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Default for PendingSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                next_id: 0,
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SlotState {
        match &self.lock().state {
            State::Idle => SlotState::Idle,
            State::Awaiting { kind, deadline, .. } => SlotState::Awaiting {
                kind: *kind,
                deadline: *deadline,
            },
            State::Closed => SlotState::Closed,
        }
    }

    /// `Idle → Awaiting`. Blocks while another caller is awaiting.
    pub fn arm(&self, kind: CommandKind, timeout: Duration) -> Result<Armed, LinkError> {
        let mut inner = self.lock();
        while matches!(inner.state, State::Awaiting { .. }) {
            inner = self
                .idle
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if matches!(inner.state, State::Closed) {
            return Err(LinkError::TransportClosed);
        }
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        let (tx, rx) = sync_channel(1);
        let deadline = Instant::now() + timeout;
        inner.state = State::Awaiting {
            id,
            kind,
            deadline,
            tx,
        };
        Ok(Armed {
            id,
            kind,
            timeout,
            deadline,
            rx,
        })
    }

    /// `Awaiting → Idle` without a reply, e.g. after a failed write.
    /// Does nothing once the slot has moved on to another arm.
    pub fn disarm(&self, armed: Armed) {
        let mut inner = self.lock();
        if inner.awaiting(&armed) {
            inner.state = State::Idle;
            self.idle.notify_one();
        }
    }

    /// Reader side: hand a decoded response to the waiting caller.
    pub fn offer(&self, resp: Response) -> Offer {
        let mut inner = self.lock();
        match &inner.state {
            State::Awaiting { kind, .. } if *kind == resp.kind() => {}
            State::Awaiting { kind, .. } => return Offer::Mismatched { awaiting: *kind },
            State::Idle | State::Closed => return Offer::Unsolicited,
        }
        if let State::Awaiting { tx, .. } = std::mem::replace(&mut inner.state, State::Idle) {
            // capacity one and a single send per arm: never blocks
            let _ = tx.try_send(Delivery::Reply(resp));
        }
        self.idle.notify_one();
        Offer::Delivered
    }

    /// Caller side: block until the reply arrives or the deadline passes.
    ///
    /// If the deadline and the reply race, whichever takes the slot lock
    /// first wins.
    pub fn wait(&self, armed: Armed) -> Result<Response, LinkError> {
        let remaining = armed.deadline.saturating_duration_since(Instant::now());
        match armed.rx.recv_timeout(remaining) {
            Ok(Delivery::Reply(resp)) => Ok(resp),
            Ok(Delivery::Closed) | Err(RecvTimeoutError::Disconnected) => {
                Err(LinkError::TransportClosed)
            }
            Err(RecvTimeoutError::Timeout) => self.expire(armed),
        }
    }

    /// Deadline passed: give the slot back unless the reader or `close`
    /// already took it from this arm.
    fn expire(&self, armed: Armed) -> Result<Response, LinkError> {
        let mut inner = self.lock();
        if inner.awaiting(&armed) {
            inner.state = State::Idle;
            self.idle.notify_one();
            return Err(armed.timed_out());
        }
        let closed = matches!(inner.state, State::Closed);
        drop(inner);
        // whoever moved the slot on sent to this arm before unlocking
        match armed.rx.try_recv() {
            Ok(Delivery::Reply(resp)) => Ok(resp),
            Ok(Delivery::Closed) | Err(TryRecvError::Disconnected) => {
                Err(LinkError::TransportClosed)
            }
            Err(TryRecvError::Empty) if closed => Err(LinkError::TransportClosed),
            Err(TryRecvError::Empty) => Err(armed.timed_out()),
        }
    }

    /// Any state `→ Closed`; a waiting caller is released with `TransportClosed`.
    pub fn close(&self) {
        let mut inner = self.lock();
        if let State::Awaiting { tx, .. } = std::mem::replace(&mut inner.state, State::Closed) {
            let _ = tx.try_send(Delivery::Closed);
        }
        self.idle.notify_all();
    }
}

impl Armed {
    fn timed_out(&self) -> LinkError {
        LinkError::Timeout {
            command: self.kind,
            after: self.timeout,
        }
    }
}
