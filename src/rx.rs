use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, trace, warn};

use crate::frame::{Decoded, decode, hex};
use crate::slot::{Offer, PendingSlot};
use crate::stats::Stats;

const READ_CHUNK: usize = 64;

/// Background receive loop. Owns the receive buffer for the session's life.
pub(crate) struct Receiver<R> {
    pub link: R,
    pub port: String,
    pub slot: Arc<PendingSlot>,
    pub stats: Arc<Stats>,
    pub closed: Arc<AtomicBool>,
}

impl<R: Read> Receiver<R> {
    pub fn run(mut self) {
        debug!(port = %self.port, "reader started");
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            let n = match self.link.read(&mut chunk) {
                Ok(0) => {
                    warn!(port = %self.port, "serial link reached end of stream");
                    break;
                }
                Ok(n) => n,
                // read timeout is the poll interval
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!(port = %self.port, error = %e, "serial read failed");
                    break;
                }
            };
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            trace!(port = %self.port, rx = %hex(&chunk[..n]), "received bytes");
            self.stats.add_rx_bytes(n);
            buf.extend_from_slice(&chunk[..n]);
            self.drain_frames(&mut buf);
        }

        // whatever ended the loop, nobody may stay blocked on a reply
        self.closed.store(true, Ordering::Release);
        self.slot.close();
        debug!(port = %self.port, "reader stopped");
    }

    fn drain_frames(&self, buf: &mut Vec<u8>) {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            match decode(buf) {
                Decoded::Complete(resp, used) => {
                    buf.drain(..used);
                    match self.slot.offer(resp) {
                        Offer::Delivered => {
                            self.stats.inc_ok();
                            debug!(port = %self.port, response = %resp, "reply delivered");
                        }
                        Offer::Unsolicited => {
                            self.stats.inc_unsolicited();
                            warn!(
                                port = %self.port,
                                response = %resp,
                                "dropping unsolicited frame"
                            );
                        }
                        Offer::Mismatched { awaiting } => {
                            self.stats.inc_unsolicited();
                            warn!(
                                port = %self.port,
                                response = %resp,
                                %awaiting,
                                "dropping frame for a different command"
                            );
                        }
                    }
                }
                Decoded::Malformed(n) => {
                    debug!(port = %self.port, discarded = %hex(&buf[..n]), "discarding noise");
                    self.stats.add_bad(n);
                    buf.drain(..n);
                }
                Decoded::Incomplete => return,
            }
        }
    }
}
