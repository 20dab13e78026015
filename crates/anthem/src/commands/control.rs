//! Warmup, outlet, pause, and off handlers.

use anthem_core::{Command as CoreCommand, Controller, Outlet};

use crate::cli::{GlobalOpts, OutletArgs, OutletCommand, PauseArgs, WarmupArgs, WarmupCommand};
use crate::error::CliError;

use super::util;

pub async fn warmup(
    controller: &Controller,
    args: WarmupArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (cmd, message) = match args.command {
        WarmupCommand::Start { device, preset } => (
            CoreCommand::StartWarmup {
                device_id: device,
                preset_id: preset,
            },
            "Warmup started",
        ),
        WarmupCommand::Stop { device, preset } => (
            CoreCommand::StopWarmup {
                device_id: device,
                preset_id: preset,
            },
            "Warmup stopped",
        ),
    };
    let result = controller.execute(cmd).await?;
    util::report_ack(&result, message, global)
}

pub async fn outlet(
    controller: &Controller,
    args: OutletArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (cmd, message) = match args.command {
        OutletCommand::On {
            device,
            outlet,
            temperature,
            flow,
        } => {
            let outlet = Outlet::from(outlet);
            (
                CoreCommand::TurnOnOutlet {
                    device_id: device,
                    outlet,
                    temperature_celsius: temperature,
                    flow_percent: flow,
                },
                format!("{outlet} on at {temperature}°C, {flow}%"),
            )
        }
        OutletCommand::Temperature {
            device,
            outlet,
            celsius,
            flow,
        } => {
            let outlet = Outlet::from(outlet);
            (
                CoreCommand::SetTemperature {
                    device_id: device,
                    outlet,
                    temperature_celsius: celsius,
                    flow_percent: flow,
                },
                format!("{outlet} set to {celsius}°C"),
            )
        }
        OutletCommand::Flow {
            device,
            outlet,
            percent,
            temperature,
        } => {
            let outlet = Outlet::from(outlet);
            (
                CoreCommand::SetFlow {
                    device_id: device,
                    outlet,
                    flow_percent: percent,
                    temperature_celsius: temperature,
                },
                format!("{outlet} set to {percent}%"),
            )
        }
    };
    let result = controller.execute(cmd).await?;
    util::report_ack(&result, &message, global)
}

pub async fn pause(
    controller: &Controller,
    args: PauseArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = controller
        .execute(CoreCommand::Pause {
            device_id: args.device,
            temperature_celsius: args.temperature,
            flow_percent: args.flow,
        })
        .await?;
    util::report_ack(&result, "Water paused", global)
}

pub async fn off(
    controller: &Controller,
    device: String,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = controller
        .execute(CoreCommand::TurnOff { device_id: device })
        .await?;
    util::report_ack(&result, "Valves off", global)
}
