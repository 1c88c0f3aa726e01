//! In-process stand-in for an MSHPro hotplate on the other end of the cable.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use mshpro_link::frame::{checksum, encode_reply};
use mshpro_link::proto::{DeviceInfo, DeviceStatus};
use mshpro_link::{CommandKind, Mode, Response, Rpm, Session, Temperature};

const POLL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub struct SimState {
    pub stir_set: u16,
    pub stir_on: bool,
    pub heat_set: u16,
    pub heat_on: bool,
    pub heat_actual: u16,
    pub heat_limit: u16,
    pub mode: Mode,
    /// Never answer.
    pub silent: bool,
    /// Answer setters with the failure flag.
    pub refuse: bool,
    /// Make the host's writes fail.
    pub fail_writes: bool,
    pub reply_delay: Duration,
    /// Bytes sent ahead of every reply.
    pub noise: Vec<u8>,
    /// Every request received, in order.
    pub requests: Vec<(CommandKind, u16)>,
    /// Set if a request arrived before the previous reply went out.
    pub overlap: bool,
    pub outstanding: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            stir_set: 0,
            stir_on: false,
            heat_set: 0,
            heat_on: false,
            heat_actual: 175,
            heat_limit: 3400,
            mode: Mode::A,
            silent: false,
            refuse: false,
            fail_writes: false,
            reply_delay: Duration::ZERO,
            noise: Vec::new(),
            requests: Vec::new(),
            overlap: false,
            outstanding: false,
        }
    }
}

impl SimState {
    fn respond(&mut self, kind: CommandKind, value: u16) -> Response {
        let ack = |success| Response::Ack { kind, success };
        match kind {
            CommandKind::Ping => ack(true),
            CommandKind::Info => Response::Info(DeviceInfo {
                mode: self.mode,
                stir_on: self.stir_on,
                heat_on: self.heat_on,
                heat_limit: Temperature::from_tenths(self.heat_limit),
                heat_alarm: false,
            }),
            CommandKind::Status => Response::Status(DeviceStatus {
                stir_set: Rpm::from_raw(self.stir_set),
                // motor never quite reaches the setpoint
                stir_actual: Rpm::from_raw(if self.stir_on {
                    self.stir_set.saturating_sub(3)
                } else {
                    0
                }),
                heat_set: Temperature::from_tenths(self.heat_set),
                heat_actual: Temperature::from_tenths(self.heat_actual),
            }),
            _ if self.refuse => ack(false),
            // every set value toggles the function
            CommandKind::Stir => {
                self.stir_set = value;
                self.stir_on = !self.stir_on;
                ack(true)
            }
            CommandKind::Heat => {
                self.heat_set = value;
                self.heat_on = !self.heat_on;
                ack(true)
            }
            CommandKind::Mode => {
                self.mode = match self.mode {
                    Mode::A => Mode::B,
                    Mode::B => Mode::C,
                    Mode::C => Mode::A,
                };
                ack(true)
            }
        }
    }

    pub fn count(&self, kind: CommandKind) -> usize {
        self.requests.iter().filter(|(k, _)| *k == kind).count()
    }
}

/// Host read half: bytes the device sends.
pub struct SimReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for SimReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(POLL) {
                Ok(bytes) => self.pending = bytes,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Host write half: requests go to the simulated device.
pub struct SimWriter {
    state: Arc<Mutex<SimState>>,
    to_host: Sender<Vec<u8>>,
    inbound: Vec<u8>,
}

impl Write for SimWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if lock(&self.state).fail_writes {
            return Err(io::Error::other("cable unplugged"));
        }
        self.inbound.extend_from_slice(buf);
        while self.inbound.len() >= 6 {
            let req: Vec<u8> = self.inbound.drain(..6).collect();
            self.handle(&req);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SimWriter {
    fn handle(&mut self, req: &[u8]) {
        assert_eq!(req[0], 0xFE, "bad request start");
        assert_eq!(req[5], checksum(&req[1..5]), "bad request checksum");
        let kind = CommandKind::from_code(req[1]).expect("unknown request code");
        let value = u16::from_be_bytes([req[2], req[3]]);

        let mut st = lock(&self.state);
        if st.outstanding {
            st.overlap = true;
        }
        st.requests.push((kind, value));
        if st.silent {
            return;
        }
        let resp = st.respond(kind, value);
        let mut bytes = st.noise.clone();
        bytes.extend(encode_reply(&resp));
        let delay = st.reply_delay;
        st.outstanding = true;
        drop(st);

        let state = Arc::clone(&self.state);
        let tx = self.to_host.clone();
        let send = move || {
            lock(&state).outstanding = false;
            let _ = tx.send(bytes);
        };
        if delay.is_zero() {
            send();
        } else {
            thread::spawn(move || {
                thread::sleep(delay);
                send();
            });
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Sim {
    pub state: Arc<Mutex<SimState>>,
    to_host: Sender<Vec<u8>>,
}

impl Sim {
    pub fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// Push raw bytes to the host as if the device sent them unprompted.
    pub fn inject(&self, bytes: &[u8]) {
        self.to_host.send(bytes.to_vec()).unwrap();
    }
}

pub fn session() -> (Session, Sim) {
    session_with(SimState::default())
}

pub fn session_with(state: SimState) -> (Session, Sim) {
    let (to_host, rx) = channel();
    let state = Arc::new(Mutex::new(state));
    let reader = SimReader {
        rx,
        pending: Vec::new(),
    };
    let writer = SimWriter {
        state: Arc::clone(&state),
        to_host: to_host.clone(),
        inbound: Vec::new(),
    };
    let session = Session::from_halves("sim", reader, writer).unwrap();
    (session, Sim { state, to_host })
}
