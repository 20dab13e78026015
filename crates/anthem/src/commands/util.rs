//! Shared helpers for command handlers.

use anthem_core::{CommandEncoding, CommandResult, Outlet, ValveMode, ValvePrefix};

use crate::cli::{EncodingArg, GlobalOpts, ModeArg, OutletArg, OutputFormat, ValveArg};
use crate::error::CliError;
use crate::output;

// ── Arg → domain conversions ────────────────────────────────────────

impl From<OutletArg> for Outlet {
    fn from(arg: OutletArg) -> Self {
        match arg {
            OutletArg::Showerhead => Self::Showerhead,
            OutletArg::TubFiller => Self::TubFiller,
            OutletArg::Handshower => Self::Handshower,
            OutletArg::TubHandheld => Self::TubHandheld,
        }
    }
}

impl From<ModeArg> for ValveMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Off => Self::Off,
            ModeArg::Shower => Self::Shower,
            ModeArg::TubFiller => Self::TubFiller,
            ModeArg::TubHandheld => Self::TubHandheld,
            ModeArg::Stop => Self::Stop,
        }
    }
}

impl From<ValveArg> for ValvePrefix {
    fn from(arg: ValveArg) -> Self {
        match arg {
            ValveArg::Primary => Self::Primary,
            ValveArg::Secondary1 => Self::Secondary1,
            ValveArg::Secondary2 => Self::Secondary2,
            ValveArg::Secondary3 => Self::Secondary3,
            ValveArg::Secondary4 => Self::Secondary4,
            ValveArg::Secondary5 => Self::Secondary5,
            ValveArg::Secondary6 => Self::Secondary6,
            ValveArg::Secondary7 => Self::Secondary7,
        }
    }
}

impl From<EncodingArg> for CommandEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Legacy => Self::Legacy,
            EncodingArg::Scaled => Self::Scaled,
        }
    }
}

// ── Command acknowledgement ─────────────────────────────────────────

/// Report an accepted command.
///
/// Structured formats print the acknowledgement to stdout; table and
/// plain print `message` to stderr.
pub fn report_ack(
    result: &CommandResult,
    message: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ack = result.ack();
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            if !global.quiet {
                eprintln!("{message} (correlation id {})", ack.correlation_id);
            }
        }
        _ => {
            let out = output::render_single(
                &global.output,
                ack,
                |a| a.correlation_id.clone(),
                |a| a.correlation_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}
