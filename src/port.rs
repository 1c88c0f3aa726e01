use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::time::Duration;
use tracing::debug;

use crate::error::LinkError;

/// The hotplate only speaks 9600 8N1 without flow control.
pub const BAUD_RATE: u32 = 9600;
/// Serial read timeout; bounds how long the reader takes to notice `close`.
pub const DEFAULT_READ_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Device path, or a bare number (`0` → `/dev/ttyUSB0` / `COM0`).
    pub port: String,
    pub read_poll: Duration,
    /// Fail with `PortNotFound` before opening if the path does not exist.
    pub check_exists: bool,
}

impl PortConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            read_poll: DEFAULT_READ_POLL,
            check_exists: true,
        }
    }
}

/// Map a bare port number to the platform's usual device name.
pub fn resolve_port_name(port: &str) -> String {
    match port.trim().parse::<u32>() {
        Ok(n) if cfg!(windows) => format!("COM{}", n),
        Ok(n) => format!("/dev/ttyUSB{}", n),
        Err(_) => port.to_string(),
    }
}

pub fn open_port(cfg: &PortConfig) -> Result<(String, Box<dyn SerialPort>), LinkError> {
    let name = resolve_port_name(&cfg.port);
    if cfg.check_exists && !cfg!(windows) && !std::path::Path::new(&name).exists() {
        return Err(LinkError::PortNotFound(name));
    }

    let builder = serialport::new(&name, BAUD_RATE)
        .timeout(cfg.read_poll)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None);

    let port = builder.open().map_err(|source| LinkError::PortUnavailable {
        port: name.clone(),
        source,
    })?;
    debug!(port = %name, baud = BAUD_RATE, "serial port open");
    Ok((name, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_port_names_are_expanded() {
        let expected = if cfg!(windows) { "COM3" } else { "/dev/ttyUSB3" };
        assert_eq!(resolve_port_name("3"), expected);
        assert_eq!(resolve_port_name("/dev/ttyS1"), "/dev/ttyS1");
    }

    #[test]
    fn missing_port_is_reported_before_open() {
        if cfg!(windows) {
            return;
        }
        let cfg = PortConfig::new("/dev/does-not-exist-mshpro");
        assert!(matches!(open_port(&cfg), Err(LinkError::PortNotFound(_))));
    }
}
