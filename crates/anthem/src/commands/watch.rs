//! Realtime notification stream.

use chrono::Utc;
use futures_util::StreamExt;
use serde::Serialize;

use anthem_core::{Controller, ControllerEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::state;

#[derive(Serialize)]
struct EventLine {
    at: String,
    event: &'static str,
    detail: String,
}

impl From<&ControllerEvent> for EventLine {
    fn from(event: &ControllerEvent) -> Self {
        let (name, detail) = match event {
            ControllerEvent::RealtimeConnected => ("connected", String::new()),
            ControllerEvent::RealtimeDisconnected { reason } => ("disconnected", reason.clone()),
            ControllerEvent::Invalidated { source } => ("changed", source.clone()),
            ControllerEvent::RealtimeFailed { message } => ("failed", message.clone()),
        };
        Self {
            at: Utc::now().to_rfc3339(),
            event: name,
            detail,
        }
    }
}

fn print_event(line: &EventLine, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            format!("{}  {:<12}  {}", line.at, line.event, line.detail)
        }
        // One document per line so the stream stays parseable
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(line)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(line)?),
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !controller.has_realtime() {
        return Err(CliError::Realtime {
            message: "notifications are unavailable for this account".into(),
        });
    }

    let mut events = controller.event_stream();
    if !global.quiet {
        eprintln!("Watching for notifications (Ctrl-C to stop)");
    }

    let mut changes = 0usize;
    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = events.next() => next,
        };
        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "notifications dropped");
                continue;
            }
            None => break,
        };

        print_event(&EventLine::from(&event), global)?;

        match event {
            ControllerEvent::RealtimeFailed { message } => {
                return Err(CliError::Realtime { message });
            }
            ControllerEvent::Invalidated { .. } => {
                if let Some(ref device) = args.device {
                    state::handle(controller, device, global).await?;
                }
                changes += 1;
                if args.count.is_some_and(|n| changes >= n) {
                    break;
                }
            }
            ControllerEvent::RealtimeConnected | ControllerEvent::RealtimeDisconnected { .. } => {}
        }
    }
    Ok(())
}
