//! Duplex serial session with one-command-at-a-time correlation.
//!
//! A dedicated thread drains the link and decodes frames; callers of
//! [`Session::send`] block on the pending slot until their reply shows up
//! or the deadline passes.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::ClearBuffer;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::frame::encode;
use crate::port::{PortConfig, open_port};
use crate::proto::{Command, Response};
use crate::rx::Receiver;
use crate::slot::{PendingSlot, SlotState};
use crate::stats::{Stats, StatsSnapshot};
use crate::tx::Sender;

pub struct Session {
    port: String,
    sender: Sender,
    slot: Arc<PendingSlot>,
    stats: Arc<Stats>,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open the serial port at the device's fixed settings and start the reader.
    pub fn open(cfg: &PortConfig) -> Result<Self, LinkError> {
        let (name, port) = open_port(cfg)?;
        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!(port = %name, error = %e, "could not clear serial buffers");
        }
        let reader = port.try_clone().map_err(|source| LinkError::PortUnavailable {
            port: name.clone(),
            source,
        })?;
        Self::from_halves(name, reader, port)
    }

    /// Run a session over any byte stream pair. Reads on `reader` should
    /// time out periodically (`TimedOut`/`WouldBlock`) so `close` is noticed.
    pub fn from_halves<R, W>(
        port: impl Into<String>,
        reader: R,
        writer: W,
    ) -> Result<Self, LinkError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let port = port.into();
        let slot = Arc::new(PendingSlot::new());
        let stats = Arc::new(Stats::new());
        let closed = Arc::new(AtomicBool::new(false));

        let receiver = Receiver {
            link: reader,
            port: port.clone(),
            slot: Arc::clone(&slot),
            stats: Arc::clone(&stats),
            closed: Arc::clone(&closed),
        };
        let handle = thread::Builder::new()
            .name(format!("mshpro-rx {}", port))
            .spawn(move || receiver.run())
            .map_err(LinkError::Spawn)?;

        info!(port = %port, "session open");
        Ok(Self {
            sender: Sender::new(port.clone(), Box::new(writer)),
            port,
            slot,
            stats,
            closed,
            reader: Mutex::new(Some(handle)),
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn slot_state(&self) -> SlotState {
        self.slot.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Issue one command and wait up to `timeout` for its reply.
    ///
    /// Concurrent callers are served one at a time. A `Timeout` means the
    /// device did not answer; the session stays usable.
    pub fn send(&self, cmd: &Command, timeout: Duration) -> Result<Response, LinkError> {
        if self.is_closed() {
            return Err(LinkError::TransportClosed);
        }
        // armed before writing so a fast reply is never taken as unsolicited
        let armed = self.slot.arm(cmd.kind(), timeout)?;
        let bytes = encode(cmd);
        debug!(port = %self.port, command = %cmd, "sending command");
        if let Err(e) = self.sender.write_frame(&bytes) {
            self.slot.disarm(armed);
            warn!(port = %self.port, command = %cmd, error = %e, "write failed");
            return Err(e);
        }
        self.stats.add_tx_bytes(bytes.len());

        match self.slot.wait(armed) {
            Ok(resp) => {
                debug!(port = %self.port, command = %cmd, response = %resp, "command answered");
                Ok(resp)
            }
            Err(e) => {
                if e.is_timeout() {
                    self.stats.inc_timeout();
                }
                warn!(port = %self.port, command = %cmd, error = %e, "command failed");
                Err(e)
            }
        }
    }

    /// Stop the reader, fail any waiting caller and release the port.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(port = %self.port, "closing session");
        }
        self.slot.close();
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!(port = %self.port, "reader thread panicked");
        }
        self.sender.release();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.port)
            .field("closed", &self.is_closed())
            .field("slot", &self.slot.state())
            .finish()
    }
}
