//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod presets;
pub mod state;
pub mod util;
pub mod valve;
pub mod watch;

use anthem_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, args, global).await,
        Command::State(args) => state::handle(controller, &args.device, global).await,
        Command::Presets(args) => presets::handle(controller, args, global).await,
        Command::Warmup(args) => control::warmup(controller, args, global).await,
        Command::Outlet(args) => control::outlet(controller, args, global).await,
        Command::Pause(args) => control::pause(controller, args, global).await,
        Command::Off(args) => control::off(controller, args.device, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        // Local commands are handled before a session is opened
        Command::Valve(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
