// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The
// controller's command processor executes them one at a time, in the
// order they were submitted.

use anthem_api::{CommandAck, Outlet, ValveControl};

use crate::error::CoreError;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a shower controller.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Presets ──────────────────────────────────────────────────────
    StartPreset {
        device_id: String,
        preset_id: u32,
    },
    StopPreset {
        device_id: String,
        preset_id: u32,
    },

    // ── Warmup ───────────────────────────────────────────────────────
    StartWarmup {
        device_id: String,
        preset_id: Option<u32>,
    },
    StopWarmup {
        device_id: String,
        preset_id: Option<u32>,
    },

    // ── Valves ───────────────────────────────────────────────────────
    TurnOnOutlet {
        device_id: String,
        outlet: Outlet,
        temperature_celsius: f64,
        flow_percent: f64,
    },
    /// Change temperature; flow falls back to the default when `None`.
    SetTemperature {
        device_id: String,
        outlet: Outlet,
        temperature_celsius: f64,
        flow_percent: Option<f64>,
    },
    /// Change flow; temperature falls back to the default when `None`.
    SetFlow {
        device_id: String,
        outlet: Outlet,
        flow_percent: f64,
        temperature_celsius: Option<f64>,
    },
    Pause {
        device_id: String,
        temperature_celsius: f64,
        flow_percent: f64,
    },
    TurnOff {
        device_id: String,
    },
    /// Raw per-valve command words.
    ControlValves {
        device_id: String,
        control: ValveControl,
    },
}

impl Command {
    /// The device this command is addressed to.
    pub fn device_id(&self) -> &str {
        match self {
            Self::StartPreset { device_id, .. }
            | Self::StopPreset { device_id, .. }
            | Self::StartWarmup { device_id, .. }
            | Self::StopWarmup { device_id, .. }
            | Self::TurnOnOutlet { device_id, .. }
            | Self::SetTemperature { device_id, .. }
            | Self::SetFlow { device_id, .. }
            | Self::Pause { device_id, .. }
            | Self::TurnOff { device_id }
            | Self::ControlValves { device_id, .. } => device_id,
        }
    }
}

/// Outcome of an accepted command.
///
/// Acceptance is not completion; the device applies the command
/// asynchronously and reports through device state.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Accepted(CommandAck),
}

impl CommandResult {
    pub fn ack(&self) -> &CommandAck {
        match self {
            Self::Accepted(ack) => ack,
        }
    }
}
