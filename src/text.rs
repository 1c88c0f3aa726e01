//! One-line text commands, e.g. `STIR 560`, `HEAT OFF`, `MODE B`.

use std::str::FromStr;

use thiserror::Error;

use crate::proto::{Mode, ParameterError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TextError {
    #[error("empty command")]
    Empty,
    #[error("could not find command: {0}")]
    UnknownCommand(String),
    #[error("missing value for {0}")]
    MissingArgument(&'static str),
    #[error("invalid value for {what}: {input}")]
    BadValue { what: &'static str, input: String },
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextCommand {
    Ping,
    Status,
    Off,
    /// `None` switches stirring off.
    Stir(Option<u16>),
    /// `None` switches heating off.
    Heat(Option<f64>),
    Mode(Mode),
}

impl FromStr for TextCommand {
    type Err = TextError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let upper = line.to_ascii_uppercase();
        let mut tokens = upper.split_whitespace();
        let verb = tokens.next().ok_or(TextError::Empty)?;
        let mut arg = |what: &'static str| tokens.next().ok_or(TextError::MissingArgument(what));

        match verb {
            "PING" => Ok(TextCommand::Ping),
            "STATUS" => Ok(TextCommand::Status),
            "OFF" => Ok(TextCommand::Off),
            "STIR" => match arg("STIR")? {
                "OFF" => Ok(TextCommand::Stir(None)),
                v => v
                    .parse::<u16>()
                    .map(|rpm| TextCommand::Stir(Some(rpm)))
                    .map_err(|_| TextError::BadValue {
                        what: "STIR",
                        input: v.to_string(),
                    }),
            },
            "HEAT" => match arg("HEAT")? {
                "OFF" => Ok(TextCommand::Heat(None)),
                v => v
                    .parse::<f64>()
                    .map(|c| TextCommand::Heat(Some(c)))
                    .map_err(|_| TextError::BadValue {
                        what: "HEAT",
                        input: v.to_string(),
                    }),
            },
            "MODE" => Ok(TextCommand::Mode(arg("MODE")?.parse()?)),
            _ => Err(TextError::UnknownCommand(line.trim().to_string())),
        }
    }
}
