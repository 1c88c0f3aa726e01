use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// First byte of every host → device request.
pub const REQUEST_START: u8 = 0xFE;
/// First byte of every device → host reply.
pub const REPLY_START: u8 = 0xFD;
/// Every request is exactly this long.
pub const REQUEST_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("invalid {what}: {value} outside allowed range {min}-{max}")]
    InvalidParameter {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("invalid {what}: {input:?}")]
    Unparsable { what: &'static str, input: String },
}

/// Operation identifier carried in the code byte of requests and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Info,
    Status,
    Stir,
    Heat,
    /// Cycles the heating profile A → B → C. Not documented by the vendor.
    Mode,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Ping,
        CommandKind::Info,
        CommandKind::Status,
        CommandKind::Stir,
        CommandKind::Heat,
        CommandKind::Mode,
    ];

    pub const fn code(self) -> u8 {
        match self {
            CommandKind::Ping => 0xA0,
            CommandKind::Info => 0xA1,
            CommandKind::Status => 0xA2,
            CommandKind::Stir => 0xB1,
            CommandKind::Heat => 0xB2,
            CommandKind::Mode => 0xB3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Length of the reply frame the device sends for this operation.
    pub const fn reply_len(self) -> usize {
        match self {
            CommandKind::Info | CommandKind::Status => 11,
            _ => 6,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandKind::Ping => "PING",
            CommandKind::Info => "INFO",
            CommandKind::Status => "STATUS",
            CommandKind::Stir => "STIR",
            CommandKind::Heat => "HEAT",
            CommandKind::Mode => "MODE",
        };
        f.write_str(s)
    }
}

/// Stir speed in revolutions per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rpm(u16);

impl Rpm {
    pub fn new(rpm: u32) -> Result<Self, ParameterError> {
        u16::try_from(rpm)
            .map(Rpm)
            .map_err(|_| ParameterError::InvalidParameter {
                what: "stir speed (rpm)",
                value: rpm as f64,
                min: 0.0,
                max: u16::MAX as f64,
            })
    }

    pub const fn from_raw(raw: u16) -> Self {
        Rpm(raw)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rpm", self.0)
    }
}

/// Temperature with 0.1 °C resolution, stored as tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature {
    tenths: u16,
}

impl Temperature {
    /// Rounds down to the next 0.1 °C step, as the device does.
    pub fn from_celsius(celsius: f64) -> Result<Self, ParameterError> {
        let max = u16::MAX as f64 / 10.0;
        if !celsius.is_finite() || !(0.0..=max).contains(&celsius) {
            return Err(ParameterError::InvalidParameter {
                what: "temperature (°C)",
                value: celsius,
                min: 0.0,
                max,
            });
        }
        // 0.1 steps are not exact in binary; nudge before truncating
        let tenths = (celsius * 10.0 + 1e-6).trunc().min(u16::MAX as f64);
        Ok(Temperature {
            tenths: tenths as u16,
        })
    }

    pub const fn from_tenths(tenths: u16) -> Self {
        Temperature { tenths }
    }

    pub const fn tenths(self) -> u16 {
        self.tenths
    }

    pub fn celsius(self) -> f64 {
        f64::from(self.tenths) / 10.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} °C", self.tenths / 10, self.tenths % 10)
    }
}

/// Heating profile. `A` reaches the target fastest, `C` avoids overshoot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    A,
    B,
    C,
}

impl Mode {
    /// Device encoding: 1 = A, 2 = B, 3 = C.
    pub fn from_wire(b: u8) -> Option<Self> {
        match b {
            1 => Some(Mode::A),
            2 => Some(Mode::B),
            3 => Some(Mode::C),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        match self {
            Mode::A => 0,
            Mode::B => 1,
            Mode::C => 2,
        }
    }

    /// Number of MODE toggles needed to move from `self` to `target`.
    pub const fn steps_to(self, target: Mode) -> u8 {
        (3 + target.index() - self.index()) % 3
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::A => "A",
            Mode::B => "B",
            Mode::C => "C",
        };
        f.write_str(s)
    }
}

impl FromStr for Mode {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Mode::A),
            "B" => Ok(Mode::B),
            "C" => Ok(Mode::C),
            _ => Err(ParameterError::Unparsable {
                what: "mode",
                input: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // ---- Queries ----
    Ping,
    Info,
    Status,

    // ---- Setters (sending a value also toggles the function on/off) ----
    Stir(Rpm),
    Heat(Temperature),
    Mode,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Ping => CommandKind::Ping,
            Command::Info => CommandKind::Info,
            Command::Status => CommandKind::Status,
            Command::Stir(_) => CommandKind::Stir,
            Command::Heat(_) => CommandKind::Heat,
            Command::Mode => CommandKind::Mode,
        }
    }

    /// 16-bit parameter carried in the request; zero for queries.
    pub fn value(&self) -> u16 {
        match self {
            Command::Stir(rpm) => rpm.get(),
            Command::Heat(t) => t.tenths(),
            _ => 0,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stir(rpm) => write!(f, "STIR {}", rpm),
            Command::Heat(t) => write!(f, "HEAT {}", t),
            other => write!(f, "{}", other.kind()),
        }
    }
}
