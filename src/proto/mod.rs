//! Typed commands and responses for the MSHPro hotplate protocol.

pub mod command;
pub mod response;

pub use command::{Command, CommandKind, Mode, ParameterError, Rpm, Temperature};
pub use response::{DeviceInfo, DeviceStatus, Response, Setpoint};
