// anthem-core: Session layer between anthem-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod controller;
pub mod error;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{AccountCredentials, ControllerConfig};
pub use controller::{ConnectionState, Controller, ControllerEvent};
pub use error::CoreError;

// Gateway types consumers handle directly.
pub use anthem_api::model::TemperatureUnit;
pub use anthem_api::units;
pub use anthem_api::{
    Account, CommandAck, CommandEncoding, CommandWord, DecodedCommand, Device, DeviceState,
    Outlet, Preset, PresetList, TokenState, ValveControl, ValveMode, ValvePrefix,
};
