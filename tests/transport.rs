mod common;

use std::io;
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::thread;
use std::time::{Duration, Instant};

use mshpro_link::frame::encode_reply;
use mshpro_link::proto::DeviceStatus;
use mshpro_link::slot::SlotState;
use mshpro_link::{Command, CommandKind, LinkError, Response, Rpm, Session, Temperature};

use common::{SimState, session, session_with};

const TIMEOUT: Duration = Duration::from_millis(500);

fn wait_until(mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(2), "condition never became true");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn ping_is_answered() {
    let (session, _sim) = session();
    let resp = session.send(&Command::Ping, TIMEOUT).unwrap();
    assert_eq!(
        resp,
        Response::Ack {
            kind: CommandKind::Ping,
            success: true
        }
    );
    assert_eq!(session.slot_state(), SlotState::Idle);
    assert_eq!(session.stats().ok, 1);
    assert_eq!(session.stats().tx_bytes, 6);
}

#[test]
fn status_query_returns_decoded_status() {
    let (session, _sim) = session();
    let resp = session.send(&Command::Status, Duration::from_secs(2)).unwrap();
    assert_eq!(
        resp,
        Response::Status(DeviceStatus {
            stir_set: Rpm::from_raw(0),
            stir_actual: Rpm::from_raw(0),
            heat_set: Temperature::from_tenths(0),
            heat_actual: Temperature::from_tenths(175),
        })
    );
}

#[test]
fn device_failure_flag_is_a_response() {
    let (session, _sim) = session_with(SimState {
        refuse: true,
        ..SimState::default()
    });
    let resp = session
        .send(&Command::Stir(Rpm::new(400).unwrap()), TIMEOUT)
        .unwrap();
    assert!(!resp.success());
    assert_eq!(resp.kind(), CommandKind::Stir);
}

#[test]
fn silent_device_times_out_and_session_survives() {
    let (session, sim) = session_with(SimState {
        silent: true,
        ..SimState::default()
    });
    let timeout = Duration::from_millis(150);
    let start = Instant::now();
    let err = session.send(&Command::Status, timeout).unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_timeout(), "got {err:?}");
    assert!(elapsed >= timeout, "returned early after {elapsed:?}");
    assert!(elapsed < timeout + Duration::from_millis(400), "returned late after {elapsed:?}");
    assert_eq!(session.slot_state(), SlotState::Idle);
    assert_eq!(session.stats().timeouts, 1);

    sim.state().silent = false;
    assert!(session.send(&Command::Ping, TIMEOUT).unwrap().success());
}

#[test]
fn stale_reply_after_timeout_is_dropped() {
    let (session, sim) = session_with(SimState {
        reply_delay: Duration::from_millis(150),
        ..SimState::default()
    });
    let err = session
        .send(&Command::Status, Duration::from_millis(30))
        .unwrap_err();
    assert!(err.is_timeout());

    wait_until(|| session.stats().unsolicited == 1);

    sim.state().reply_delay = Duration::ZERO;
    let resp = session.send(&Command::Ping, TIMEOUT).unwrap();
    assert_eq!(resp.kind(), CommandKind::Ping);
}

#[test]
fn unsolicited_frame_does_not_disturb_next_exchange() {
    let (session, sim) = session();
    sim.inject(&encode_reply(&Response::Status(DeviceStatus {
        stir_set: Rpm::from_raw(999),
        stir_actual: Rpm::from_raw(999),
        heat_set: Temperature::from_tenths(999),
        heat_actual: Temperature::from_tenths(999),
    })));
    wait_until(|| session.stats().unsolicited == 1);

    let Response::Status(status) = session.send(&Command::Status, TIMEOUT).unwrap() else {
        panic!("expected status");
    };
    assert_eq!(status.stir_set.get(), 0);
    assert_eq!(status.heat_actual.celsius(), 17.5);
}

#[test]
fn noise_before_reply_is_skipped() {
    let noise = vec![0x00, 0x13, 0xFD, 0x77];
    let (session, _sim) = session_with(SimState {
        noise: noise.clone(),
        ..SimState::default()
    });
    let resp = session.send(&Command::Info, TIMEOUT).unwrap();
    assert_eq!(resp.kind(), CommandKind::Info);
    assert_eq!(session.stats().bad, noise.len() as u64);
}

#[test]
fn reply_split_across_reads_is_reassembled() {
    let (session, sim) = session_with(SimState {
        silent: true,
        ..SimState::default()
    });
    let session = Arc::new(session);
    let caller = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.send(&Command::Ping, Duration::from_secs(2)))
    };
    wait_until(|| matches!(session.slot_state(), SlotState::Awaiting { .. }));

    let frame = encode_reply(&Response::Ack {
        kind: CommandKind::Ping,
        success: true,
    });
    for byte in frame {
        sim.inject(&[byte]);
        thread::sleep(Duration::from_millis(5));
    }
    assert!(caller.join().unwrap().unwrap().success());
}

#[test]
fn concurrent_sends_are_serialized() {
    let (session, sim) = session_with(SimState {
        reply_delay: Duration::from_millis(40),
        ..SimState::default()
    });
    let session = Arc::new(session);
    let callers: Vec<_> = [Command::Ping, Command::Status, Command::Info, Command::Ping]
        .into_iter()
        .map(|cmd| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let resp = session.send(&cmd, Duration::from_secs(2)).unwrap();
                assert_eq!(resp.kind(), cmd.kind());
            })
        })
        .collect();
    for c in callers {
        c.join().unwrap();
    }

    let st = sim.state();
    assert_eq!(st.requests.len(), 4);
    assert!(!st.overlap, "a request was written while another was outstanding");
}

#[test]
fn close_releases_blocked_caller() {
    let (session, _sim) = session_with(SimState {
        silent: true,
        ..SimState::default()
    });
    let session = Arc::new(session);
    let caller = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let start = Instant::now();
            (session.send(&Command::Status, Duration::from_secs(5)), start.elapsed())
        })
    };
    wait_until(|| matches!(session.slot_state(), SlotState::Awaiting { .. }));
    session.close();

    let (result, elapsed) = caller.join().unwrap();
    assert!(matches!(result, Err(LinkError::TransportClosed)));
    assert!(elapsed < Duration::from_secs(2));
    assert!(session.is_closed());
    assert!(matches!(
        session.send(&Command::Ping, TIMEOUT),
        Err(LinkError::TransportClosed)
    ));
}

#[test]
fn write_failure_aborts_without_retry() {
    let (session, sim) = session_with(SimState {
        fail_writes: true,
        ..SimState::default()
    });
    let err = session.send(&Command::Ping, TIMEOUT).unwrap_err();
    assert!(matches!(err, LinkError::Write(_)));
    assert_eq!(session.slot_state(), SlotState::Idle);
    assert!(sim.state().requests.is_empty());

    sim.state().fail_writes = false;
    assert!(session.send(&Command::Ping, TIMEOUT).unwrap().success());
}

#[test]
fn end_of_stream_closes_session() {
    let (to_host, rx) = channel::<Vec<u8>>();
    let reader = ChannelReader(rx);
    let session = Session::from_halves("eof", reader, io::sink()).unwrap();
    drop(to_host);

    wait_until(|| session.is_closed());
    assert_eq!(session.slot_state(), SlotState::Closed);
    assert!(matches!(
        session.send(&Command::Ping, TIMEOUT),
        Err(LinkError::TransportClosed)
    ));
}

struct ChannelReader(std::sync::mpsc::Receiver<Vec<u8>>);

impl io::Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.recv_timeout(Duration::from_millis(20)) {
            Ok(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Ok(0),
        }
    }
}
