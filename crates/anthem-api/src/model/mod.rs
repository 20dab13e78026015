// Domain entities decoded from API responses via `crate::lenient`.

pub mod account;
pub mod command;
pub mod preset;
pub mod state;

pub use account::{Account, DEFAULT_SKU, Device, FlowUnit, Location, TemperatureUnit};
pub use command::{CommandAck, DeviceTarget, IotHubSettings, PresetAction};
pub use preset::{OutletDetail, Preset, PresetList, ValveDetail};
pub use state::{
    ConnectionStatus, DeviceSettings, DeviceState, OperatingMode, OutletConfiguration,
    OutletState, OutletType, SystemState, ValveSettings, ValveState, WarmupState, WarmupStatus,
};
