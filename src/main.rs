use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;

use mshpro_link::{Hotplate, Outcome};

mod cli;
mod logging;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init_logging(args.log_level);

    let cfg = args.ser.port_config();
    let plate = Hotplate::open(&cfg)
        .with_context(|| format!("opening hotplate on {}", cfg.port))?
        .with_timeout(args.ser.timeout());

    let result = run(&plate, args.cmd);
    debug!(stats = %plate.session().stats(), "session stats");
    plate.close();
    result
}

fn run(plate: &Hotplate, cmd: cli::Cmd) -> Result<()> {
    use cli::Cmd;
    match cmd {
        Cmd::Ping => print_outcome(Outcome::Pong(plate.ping()))?,
        Cmd::Status { raw } => {
            let status = if raw { plate.status_raw() } else { plate.status() };
            println!("{}", status.context("reading status")?);
        }
        Cmd::Stir { rpm } => plate.stir(rpm.0).context("setting stir speed")?,
        Cmd::Heat { celsius } => plate.heat(celsius.0).context("setting temperature")?,
        Cmd::Off => plate.off().context("switching off")?,
        Cmd::Mode { mode } => plate.mode(mode).context("setting mode")?,
        Cmd::Exec { words } => {
            let line = words.join(" ");
            let outcome = plate
                .text_command(&line)
                .with_context(|| format!("running '{}'", line))?;
            print_outcome(outcome)?;
        }
    }
    Ok(())
}

fn print_outcome(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Pong(true) => println!("OK"),
        Outcome::Pong(false) => bail!("hotplate did not respond"),
        Outcome::Status(status) => println!("{}", status),
        Outcome::Done => {}
    }
    Ok(())
}
