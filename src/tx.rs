use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::error::LinkError;
use crate::frame::hex;

/// Write half of the link. Shares no lock with the reader.
pub(crate) struct Sender {
    link: Mutex<Option<Box<dyn Write + Send>>>,
    port: String,
}

impl Sender {
    pub fn new(port: String, link: Box<dyn Write + Send>) -> Self {
        Self {
            link: Mutex::new(Some(link)),
            port,
        }
    }

    pub fn write_frame(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut guard = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        let link = guard.as_mut().ok_or(LinkError::TransportClosed)?;
        trace!(port = %self.port, tx = %hex(bytes), "sending bytes");
        link.write_all(bytes).map_err(LinkError::Write)?;
        link.flush().map_err(LinkError::Write)
    }

    /// Drop the handle; later writes fail with `TransportClosed`.
    pub fn release(&self) {
        self.link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
