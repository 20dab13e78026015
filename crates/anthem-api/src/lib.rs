// anthem-api: Async Rust client for the Kohler Anthem cloud (auth, REST gateway, valve codec, realtime)

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod lenient;
pub mod model;
pub mod realtime;
pub mod transport;
pub mod units;
pub mod valve;

pub use auth::{Credential, TokenManager, TokenState};
pub use client::AnthemClient;
pub use config::{ApiConfig, AuthConfig, Endpoints};
pub use error::Error;
pub use model::{
    Account, CommandAck, Device, DeviceState, DeviceTarget, IotHubSettings, Preset, PresetList,
};
pub use realtime::{RealtimeChannel, RealtimeConfig, RealtimeEvent, ReconnectConfig};
pub use transport::TransportConfig;
pub use valve::{CommandEncoding, CommandWord, DecodedCommand, Outlet, ValveControl, ValveMode, ValvePrefix};
