//! Frame codec for the hotplate wire protocol.
//!
//! Request:  `FE <code> <hi> <lo> 00 <sum>`
//! Reply:    `FD <code> <data..> <sum>` (3 data bytes, 8 for INFO/STATUS)
//!
//! `sum` is the wrapping 8-bit sum of every byte between the start byte
//! and the checksum itself.

use crate::proto::command::{
    Command, CommandKind, Mode, REPLY_START, REQUEST_LEN, REQUEST_START, Rpm, Temperature,
};
use crate::proto::response::{DeviceInfo, DeviceStatus, Response};

const ACK_SUCCESS: [u8; 3] = [0x00, 0x00, 0x00];
const ACK_FAILURE: [u8; 3] = [0x01, 0x00, 0x00];

/// Outcome of one [`decode`] attempt on the head of a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A full frame was parsed; the `usize` is the number of bytes it used.
    Complete(Response, usize),
    /// The buffer holds the start of a frame. Wait for more bytes.
    Incomplete,
    /// The leading `usize` bytes can never form a frame and must be dropped.
    Malformed(usize),
}

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

pub fn encode(cmd: &Command) -> Vec<u8> {
    let [hi, lo] = cmd.value().to_be_bytes();
    let body = [cmd.kind().code(), hi, lo, 0x00];
    let mut out = Vec::with_capacity(REQUEST_LEN);
    out.push(REQUEST_START);
    out.extend_from_slice(&body);
    out.push(checksum(&body));
    out
}

/// Try to take one reply frame off the front of `buf`.
///
/// Pure: the same buffer always yields the same result.
pub fn decode(buf: &[u8]) -> Decoded {
    let Some(&first) = buf.first() else {
        return Decoded::Incomplete;
    };
    if first != REPLY_START {
        let skip = buf
            .iter()
            .position(|&b| b == REPLY_START)
            .unwrap_or(buf.len());
        return Decoded::Malformed(skip);
    }
    let Some(&code) = buf.get(1) else {
        return Decoded::Incomplete;
    };
    let Some(kind) = CommandKind::from_code(code) else {
        return Decoded::Malformed(1);
    };
    let len = kind.reply_len();
    if buf.len() < len {
        return Decoded::Incomplete;
    }
    let frame = &buf[..len];
    if frame[len - 1] != checksum(&frame[1..len - 1]) {
        // only the start byte is known bad; a real frame may begin inside
        return Decoded::Malformed(1);
    }
    match parse_payload(kind, &frame[2..len - 1]) {
        Some(resp) => Decoded::Complete(resp, len),
        None => Decoded::Malformed(len),
    }
}

fn parse_payload(kind: CommandKind, data: &[u8]) -> Option<Response> {
    match kind {
        CommandKind::Info => {
            let mode = Mode::from_wire(data[0])?;
            Some(Response::Info(DeviceInfo {
                mode,
                // device reports 0 for "on"
                stir_on: data[1] == 0,
                heat_on: data[2] == 0,
                heat_limit: Temperature::from_tenths(be16(data, 3)),
                heat_alarm: data[5] == 0,
            }))
        }
        CommandKind::Status => Some(Response::Status(DeviceStatus {
            stir_set: Rpm::from_raw(be16(data, 0)),
            stir_actual: Rpm::from_raw(be16(data, 2)),
            heat_set: Temperature::from_tenths(be16(data, 4)),
            heat_actual: Temperature::from_tenths(be16(data, 6)),
        })),
        CommandKind::Ping | CommandKind::Stir | CommandKind::Heat | CommandKind::Mode => {
            let success = if data == ACK_SUCCESS {
                true
            } else if data == ACK_FAILURE && kind != CommandKind::Ping {
                false
            } else {
                return None;
            };
            Some(Response::Ack { kind, success })
        }
    }
}

fn be16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

/// Build a reply frame as the device would send it. Used by simulators.
pub fn build_reply(kind: CommandKind, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 3);
    out.push(REPLY_START);
    out.push(kind.code());
    out.extend_from_slice(data);
    out.push(checksum(&out[1..]));
    out
}

/// Encode a response back into device reply bytes.
pub fn encode_reply(resp: &Response) -> Vec<u8> {
    match resp {
        Response::Ack { kind, success } => {
            let data = if *success { ACK_SUCCESS } else { ACK_FAILURE };
            build_reply(*kind, &data)
        }
        Response::Info(i) => {
            let [lim_hi, lim_lo] = i.heat_limit.tenths().to_be_bytes();
            let data = [
                i.mode.index() + 1,
                u8::from(!i.stir_on),
                u8::from(!i.heat_on),
                lim_hi,
                lim_lo,
                u8::from(!i.heat_alarm),
                0,
                0,
            ];
            build_reply(CommandKind::Info, &data)
        }
        Response::Status(s) => {
            let mut data = Vec::with_capacity(8);
            data.extend_from_slice(&s.stir_set.get().to_be_bytes());
            data.extend_from_slice(&s.stir_actual.get().to_be_bytes());
            data.extend_from_slice(&s.heat_set.tenths().to_be_bytes());
            data.extend_from_slice(&s.heat_actual.tenths().to_be_bytes());
            build_reply(CommandKind::Status, &data)
        }
    }
}

/// Lowercase hex with no separators, for logs.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
