mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use anthem_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local commands: no account session
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),
        Command::Valve(args) => commands::valve::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "anthem", &mut std::io::stdout());
            Ok(())
        }

        // Everything else talks to the cloud
        cmd => {
            let (profile, mut controller_config) = config::resolve(&cli.global)?;
            let timeout = controller_config.timeout.as_secs();
            controller_config.realtime_enabled = matches!(cmd, Command::Watch(_));

            let controller = Controller::new(controller_config)?;
            tracing::debug!(command = ?cmd, %profile, "dispatching command");

            let result = match controller.open().await {
                Ok(()) => {
                    let result = commands::dispatch(cmd, &controller, &cli.global).await;
                    controller.close().await;
                    result
                }
                Err(e) => Err(e.into()),
            };
            result.map_err(|e| e.in_session(&profile, timeout))
        }
    }
}
