use std::fmt;

use super::command::{CommandKind, Mode, Rpm, Temperature};

/// A numeric field that may also read "Off".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setpoint<T> {
    Off,
    Value(T),
}

impl<T: Copy> Setpoint<T> {
    /// `Value(v)` when `on`, otherwise `Off`.
    pub fn gated(value: T, on: bool) -> Self {
        if on { Setpoint::Value(value) } else { Setpoint::Off }
    }

    pub fn value(&self) -> Option<T> {
        match self {
            Setpoint::Off => None,
            Setpoint::Value(v) => Some(*v),
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Setpoint::Off)
    }
}

impl<T: fmt::Display> fmt::Display for Setpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setpoint::Off => f.write_str("Off"),
            Setpoint::Value(v) => v.fmt(f),
        }
    }
}

/// Payload of an INFO reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mode: Mode,
    pub stir_on: bool,
    pub heat_on: bool,
    /// Maximum settable temperature configured on the device.
    pub heat_limit: Temperature,
    /// Meaning unknown; reported for completeness.
    pub heat_alarm: bool,
}

/// Payload of a STATUS reply. Setpoints are raw: the device keeps the
/// last value even while the function is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub stir_set: Rpm,
    pub stir_actual: Rpm,
    pub heat_set: Temperature,
    /// Internal sensor, or the external probe when one is attached.
    pub heat_actual: Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Reply to PING, STIR, HEAT or MODE. `success == false` is the device
    /// reporting that it refused the command.
    Ack { kind: CommandKind, success: bool },
    Info(DeviceInfo),
    Status(DeviceStatus),
}

impl Response {
    pub fn kind(&self) -> CommandKind {
        match self {
            Response::Ack { kind, .. } => *kind,
            Response::Info(_) => CommandKind::Info,
            Response::Status(_) => CommandKind::Status,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            Response::Ack { success, .. } => *success,
            Response::Info(_) | Response::Status(_) => true,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack { kind, success } => {
                write!(f, "{} {}", kind, if *success { "OK" } else { "FAILED" })
            }
            Response::Info(i) => write!(
                f,
                "INFO mode={} stir_on={} heat_on={} heat_limit={} heat_alarm={}",
                i.mode, i.stir_on, i.heat_on, i.heat_limit, i.heat_alarm
            ),
            Response::Status(s) => write!(
                f,
                "STATUS stir_set={} stir_actual={} heat_set={} heat_actual={}",
                s.stir_set, s.stir_actual, s.heat_set, s.heat_actual
            ),
        }
    }
}
