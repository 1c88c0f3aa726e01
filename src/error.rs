use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::proto::CommandKind;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("open {port}: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("start reader thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("serial write: {0}")]
    Write(#[source] io::Error),
    #[error("no reply to {command} within {after:?}")]
    Timeout { command: CommandKind, after: Duration },
    #[error("transport closed")]
    TransportClosed,
}

impl LinkError {
    /// True when the device simply did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }
}
