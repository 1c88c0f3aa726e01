use clap::{Args, Parser, Subcommand};
use std::str::FromStr;
use std::time::Duration;

use mshpro_link::{Mode, PortConfig};

use crate::logging::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(name = "mshpro", version, about = "Control an MSHPro hotplate/stirrer over RS-232")]
pub struct Cli {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Minimum log level on stderr (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Check that the hotplate is on and answering
    Ping,
    /// Print stir/heat setpoints, readings and flags
    Status {
        /// Show stored setpoints even when a function is off
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Set stir speed in rpm (100-1500), or "off"
    Stir {
        #[arg(value_parser = parse_or_off::<u16>)]
        rpm: OrOff<u16>,
    },
    /// Set temperature in °C (25.0-340.0), or "off"
    Heat {
        #[arg(value_parser = parse_or_off::<f64>, allow_hyphen_values = true)]
        celsius: OrOff<f64>,
    },
    /// Stop stirring and heating
    Off,
    /// Select heating profile A, B or C (undocumented by the vendor)
    Mode { mode: Mode },
    /// Run a text command, e.g. `exec stir 560`
    Exec {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        words: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path, or a port number (0 → /dev/ttyUSB0 or COM0)
    #[arg(short, long, env = "MSHPRO_PORT", default_value = "0", global = true)]
    pub port: String,
    /// Reply timeout per command in milliseconds
    #[arg(long, env = "MSHPRO_TIMEOUT_MS", default_value_t = 500, global = true)]
    pub timeout_ms: u64,
    /// Open the port without checking that the device path exists
    #[arg(long, default_value_t = false, global = true)]
    pub no_check: bool,
}

impl SerialOpts {
    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            check_exists: !self.no_check,
            ..PortConfig::new(self.port.clone())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A value, or `None` when the user wrote "off".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrOff<T>(pub Option<T>);

fn parse_or_off<T: FromStr>(s: &str) -> Result<OrOff<T>, String> {
    if s.eq_ignore_ascii_case("off") {
        return Ok(OrOff(None));
    }
    s.parse()
        .map(|v| OrOff(Some(v)))
        .map_err(|_| format!("expected a number or 'off', got '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stir_value_and_off() {
        let cli = Cli::try_parse_from(["mshpro", "stir", "400"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Stir { rpm: OrOff(Some(400)) }));
        let cli = Cli::try_parse_from(["mshpro", "stir", "OFF"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Stir { rpm: OrOff(None) }));
    }

    #[test]
    fn parses_global_port_after_subcommand() {
        let cli =
            Cli::try_parse_from(["mshpro", "heat", "25.5", "--port", "/dev/ttyS1", "--no-check"])
                .unwrap();
        assert_eq!(cli.ser.port, "/dev/ttyS1");
        assert!(!cli.ser.port_config().check_exists);
        assert!(matches!(cli.cmd, Cmd::Heat { celsius: OrOff(Some(c)) } if c == 25.5));
    }

    #[test]
    fn parses_mode_and_exec() {
        let cli = Cli::try_parse_from(["mshpro", "mode", "c"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Mode { mode: Mode::C }));
        let cli = Cli::try_parse_from(["mshpro", "exec", "stir", "560"]).unwrap();
        let Cmd::Exec { words } = cli.cmd else {
            panic!("expected exec");
        };
        assert_eq!(words.join(" "), "stir 560");
    }

    #[test]
    fn negative_values_are_passed_through() {
        let cli = Cli::try_parse_from(["mshpro", "exec", "heat", "-5"]).unwrap();
        let Cmd::Exec { words } = cli.cmd else {
            panic!("expected exec");
        };
        assert_eq!(words, ["heat", "-5"]);
        let cli = Cli::try_parse_from(["mshpro", "heat", "-5"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Heat { celsius: OrOff(Some(c)) } if c == -5.0));
    }

    #[test]
    fn rejects_garbage_setting() {
        let err = Cli::try_parse_from(["mshpro", "stir", "fast"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
