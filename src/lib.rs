//! Serial link to MSHPro hotplate/stirrers.
//!
//! The device answers one request at a time over RS-232 (9600 8N1). A
//! [`Session`] runs a background reader that decodes reply frames and hands
//! each one to the caller currently blocked in [`Session::send`];
//! [`Hotplate`] builds stir/heat/status operations on top of that.
//!
//! ```no_run
//! use mshpro_link::{Hotplate, PortConfig};
//!
//! let plate = Hotplate::open(&PortConfig::new("/dev/ttyUSB0"))?;
//! plate.stir(Some(400))?;
//! println!("{}", plate.status()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod frame;
pub mod hotplate;
pub mod port;
pub mod proto;
mod rx;
pub mod slot;
pub mod stats;
pub mod text;
pub mod transport;
mod tx;

pub use error::LinkError;
pub use hotplate::{Hotplate, HotplateError, HotplateStatus, Outcome};
pub use port::PortConfig;
pub use proto::{Command, CommandKind, Mode, ParameterError, Response, Rpm, Setpoint, Temperature};
pub use text::TextCommand;
pub use transport::Session;
