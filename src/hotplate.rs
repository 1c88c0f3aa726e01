//! User-level control of an MSHPro hotplate.
//!
//! The device toggles a function on or off every time it receives a set
//! value, so reaching a target may take zero, one or two commands
//! depending on the current state.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::LinkError;
use crate::port::PortConfig;
use crate::proto::{
    Command, CommandKind, DeviceInfo, DeviceStatus, Mode, ParameterError, Response, Rpm, Setpoint,
    Temperature,
};
use crate::text::{TextCommand, TextError};
use crate::transport::Session;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

pub const STIR_MIN_RPM: u16 = 100;
pub const STIR_MAX_RPM: u16 = 1500;
pub const HEAT_MIN_CELSIUS: f64 = 25.0;
pub const HEAT_MAX_CELSIUS: f64 = 340.0;

#[derive(Debug, Error)]
pub enum HotplateError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Text(#[from] TextError),
    #[error("hotplate error with command: {0}")]
    Rejected(CommandKind),
    #[error("expected reply to {expected}, got {got}")]
    UnexpectedResponse { expected: CommandKind, got: Response },
}

/// STATUS and INFO merged into one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotplateStatus {
    pub success: bool,
    pub stir_set: Setpoint<Rpm>,
    pub stir_actual: Rpm,
    pub heat_set: Setpoint<Temperature>,
    pub heat_actual: Temperature,
    pub stir_on: bool,
    pub heat_on: bool,
    pub heat_limit: Temperature,
    pub mode: Mode,
    pub heat_alarm: bool,
}

impl HotplateStatus {
    fn merge(status: DeviceStatus, info: DeviceInfo, raw: bool) -> Self {
        let (stir_set, heat_set) = if raw {
            (Setpoint::Value(status.stir_set), Setpoint::Value(status.heat_set))
        } else {
            (
                Setpoint::gated(status.stir_set, info.stir_on),
                Setpoint::gated(status.heat_set, info.heat_on),
            )
        };
        Self {
            success: true,
            stir_set,
            stir_actual: status.stir_actual,
            heat_set,
            heat_actual: status.heat_actual,
            stir_on: info.stir_on,
            heat_on: info.heat_on,
            heat_limit: info.heat_limit,
            mode: info.mode,
            heat_alarm: info.heat_alarm,
        }
    }
}

impl fmt::Display for HotplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "success:     {}", self.success)?;
        writeln!(f, "stir_set:    {}", self.stir_set)?;
        writeln!(f, "stir_actual: {}", self.stir_actual)?;
        writeln!(f, "heat_set:    {}", self.heat_set)?;
        writeln!(f, "heat_actual: {}", self.heat_actual)?;
        writeln!(f, "stir_on:     {}", self.stir_on)?;
        writeln!(f, "heat_on:     {}", self.heat_on)?;
        writeln!(f, "heat_limit:  {}", self.heat_limit)?;
        write!(f, "mode:        {}", self.mode)
    }
}

/// Result of [`Hotplate::execute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Pong(bool),
    Status(HotplateStatus),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Stir,
    Heat,
}

impl Function {
    fn command(self, raw: u16) -> Command {
        match self {
            Function::Stir => Command::Stir(Rpm::from_raw(raw)),
            Function::Heat => Command::Heat(Temperature::from_tenths(raw)),
        }
    }

    /// (raw setpoint, on) as reported by the device.
    fn current(self, status: &HotplateStatus) -> (Option<u16>, bool) {
        match self {
            Function::Stir => (status.stir_set.value().map(Rpm::get), status.stir_on),
            Function::Heat => (status.heat_set.value().map(Temperature::tenths), status.heat_on),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Function::Stir => "STIR",
            Function::Heat => "HEAT",
        })
    }
}

pub struct Hotplate {
    session: Session,
    timeout: Duration,
}

impl Hotplate {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn open(cfg: &PortConfig) -> Result<Self, LinkError> {
        Session::open(cfg).map(Self::new)
    }

    /// Per-command reply timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn close(&self) {
        self.session.close();
    }

    fn command(&self, cmd: Command) -> Result<Response, HotplateError> {
        let resp = self.session.send(&cmd, self.timeout)?;
        if resp.kind() != cmd.kind() {
            return Err(HotplateError::UnexpectedResponse {
                expected: cmd.kind(),
                got: resp,
            });
        }
        Ok(resp)
    }

    fn acknowledged(&self, cmd: Command) -> Result<(), HotplateError> {
        match self.command(cmd)? {
            Response::Ack { success: true, .. } => Ok(()),
            _ => Err(HotplateError::Rejected(cmd.kind())),
        }
    }

    /// True when the hotplate is on and answering correctly.
    pub fn ping(&self) -> bool {
        match self.acknowledged(Command::Ping) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "ping failed");
                false
            }
        }
    }

    pub fn info(&self) -> Result<DeviceInfo, HotplateError> {
        match self.command(Command::Info)? {
            Response::Info(info) => Ok(info),
            got => Err(HotplateError::UnexpectedResponse {
                expected: CommandKind::Info,
                got,
            }),
        }
    }

    pub fn device_status(&self) -> Result<DeviceStatus, HotplateError> {
        match self.command(Command::Status)? {
            Response::Status(status) => Ok(status),
            got => Err(HotplateError::UnexpectedResponse {
                expected: CommandKind::Status,
                got,
            }),
        }
    }

    /// Full status with setpoints shown as `Off` while a function is off.
    pub fn status(&self) -> Result<HotplateStatus, HotplateError> {
        let status = self.device_status()?;
        Ok(HotplateStatus::merge(status, self.info()?, false))
    }

    /// Full status with the stored setpoints even while a function is off.
    pub fn status_raw(&self) -> Result<HotplateStatus, HotplateError> {
        let status = self.device_status()?;
        Ok(HotplateStatus::merge(status, self.info()?, true))
    }

    /// `None` or `Some(0)` stops stirring.
    pub fn stir(&self, rpm: Option<u16>) -> Result<(), HotplateError> {
        match rpm {
            None | Some(0) => self.stir_off(),
            Some(rpm) => self.stir_to(rpm),
        }
    }

    fn stir_to(&self, rpm: u16) -> Result<(), HotplateError> {
        if !(STIR_MIN_RPM..=STIR_MAX_RPM).contains(&rpm) {
            return Err(ParameterError::InvalidParameter {
                what: "stir speed (rpm)",
                value: f64::from(rpm),
                min: f64::from(STIR_MIN_RPM),
                max: f64::from(STIR_MAX_RPM),
            }
            .into());
        }
        self.set_value(Function::Stir, rpm)
    }

    /// `None` or `Some(0.0)` stops heating. Heating is switched off on any error.
    pub fn heat(&self, celsius: Option<f64>) -> Result<(), HotplateError> {
        match celsius {
            Some(c) if c != 0.0 => self.heat_to(c),
            _ => self.heat_off(),
        }
    }

    fn heat_to(&self, celsius: f64) -> Result<(), HotplateError> {
        let result = if (HEAT_MIN_CELSIUS..=HEAT_MAX_CELSIUS).contains(&celsius) {
            Temperature::from_celsius(celsius)
                .map_err(HotplateError::from)
                .and_then(|t| self.set_value(Function::Heat, t.tenths()))
        } else {
            Err(ParameterError::InvalidParameter {
                what: "heat setting (°C)",
                value: celsius,
                min: HEAT_MIN_CELSIUS,
                max: HEAT_MAX_CELSIUS,
            }
            .into())
        };
        if result.is_err()
            && let Err(e) = self.heat_off()
        {
            error!(error = %e, "could not switch heating off after failure");
        }
        result
    }

    pub fn off(&self) -> Result<(), HotplateError> {
        self.switch_off(&[Function::Heat, Function::Stir])
    }

    pub fn stir_off(&self) -> Result<(), HotplateError> {
        self.switch_off(&[Function::Stir])
    }

    pub fn heat_off(&self) -> Result<(), HotplateError> {
        self.switch_off(&[Function::Heat])
    }

    /// Select a heating profile by stepping the MODE toggle.
    pub fn mode(&self, target: Mode) -> Result<(), HotplateError> {
        let current = self.info()?.mode;
        for _ in 0..current.steps_to(target) {
            self.acknowledged(Command::Mode)?;
        }
        info!(from = %current, to = %target, "mode set");
        Ok(())
    }

    pub fn execute(&self, cmd: TextCommand) -> Result<Outcome, HotplateError> {
        match cmd {
            TextCommand::Ping => Ok(Outcome::Pong(self.ping())),
            TextCommand::Status => self.status().map(Outcome::Status),
            TextCommand::Off => self.off().map(|_| Outcome::Done),
            // a number is always a setting here; only the word OFF switches off
            TextCommand::Stir(None) => self.stir_off().map(|_| Outcome::Done),
            TextCommand::Stir(Some(rpm)) => self.stir_to(rpm).map(|_| Outcome::Done),
            TextCommand::Heat(None) => self.heat_off().map(|_| Outcome::Done),
            TextCommand::Heat(Some(c)) => self.heat_to(c).map(|_| Outcome::Done),
            TextCommand::Mode(m) => self.mode(m).map(|_| Outcome::Done),
        }
    }

    /// Parse and run a text command such as `"stir 560"`.
    pub fn text_command(&self, line: &str) -> Result<Outcome, HotplateError> {
        self.execute(line.parse()?)
    }

    fn switch_off(&self, functions: &[Function]) -> Result<(), HotplateError> {
        let status = self.status()?;
        for &function in functions {
            let (set, on) = function.current(&status);
            match (on, set) {
                (false, _) | (_, None) => {
                    info!(%function, "OFF: already off");
                }
                (true, Some(set)) => {
                    // resending the current setpoint toggles the function off
                    self.acknowledged(function.command(set)).inspect_err(|e| {
                        error!(%function, error = %e, "OFF failed");
                    })?;
                    info!(%function, "OFF: switched off");
                }
            }
        }
        Ok(())
    }

    fn set_value(&self, function: Function, target: u16) -> Result<(), HotplateError> {
        let status = self.status_raw()?;
        let (set, on) = function.current(&status);
        let cmd = function.command(target);

        if set == Some(target) {
            if on {
                info!(%function, target, "already at target value");
                return Ok(());
            }
            self.acknowledged(cmd)?;
            info!(%function, target, "switched on");
            return Ok(());
        }

        // a new value toggles on/off as well as setting the target
        self.acknowledged(cmd)?;
        if !on {
            info!(%function, target, "set value, switched on");
            return Ok(());
        }
        self.acknowledged(cmd)?;
        info!(%function, target, "switched off, set value, switched on");
        Ok(())
    }
}
