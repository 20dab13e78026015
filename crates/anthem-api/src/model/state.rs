// Device telemetry from the gcsadvancestate endpoint.
//
// Snapshots only. Issuing a command never patches these locally; callers
// re-fetch after a command or a realtime invalidation.

use serde::Serialize;

use crate::lenient::{Fields, FromWire};
use crate::model::account::DEFAULT_SKU;

// ── Enumerations ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

/// Whether a shower session is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
pub enum OperatingMode {
    #[default]
    #[strum(serialize = "normalOperation")]
    Normal,
    #[strum(serialize = "showerInProgress")]
    ShowerInProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
pub enum WarmupStatus {
    #[default]
    #[strum(serialize = "warmUpNotInProgress")]
    NotInProgress,
    #[strum(serialize = "warmUpInProgress")]
    InProgress,
}

/// Outlet type codes from the device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum OutletType {
    Handshower,
    Showerhead,
    TubFiller,
}

impl OutletType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Handshower),
            11 => Some(Self::Showerhead),
            21 => Some(Self::TubFiller),
            _ => None,
        }
    }
}

// ── Device state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub id: String,
    pub device_id: String,
    pub sku: String,
    pub tenant_id: String,
    pub connection: ConnectionStatus,
    pub last_connected: Option<i64>,
    pub system: SystemState,
    pub settings: DeviceSettings,
}

impl DeviceState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    pub fn is_running(&self) -> bool {
        self.system.is_running()
    }

    pub fn is_warming_up(&self) -> bool {
        self.system.is_warming_up()
    }

    pub fn active_preset_id(&self) -> Option<u32> {
        self.system.active_preset_id()
    }
}

impl FromWire for DeviceState {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            id: f.string("id"),
            device_id: f.string("deviceId"),
            sku: f.string_or("sku", DEFAULT_SKU),
            tenant_id: f.string("tenantId"),
            connection: f.enum_or("connectionState", ConnectionStatus::Disconnected),
            last_connected: f.opt_i64("lastConnected"),
            system: f.object("state"),
            settings: f.object("setting"),
        }
    }
}

// ── System state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemState {
    pub mode: OperatingMode,
    pub warmup: WarmupState,
    /// Raw preset reference; `"0"` means none.
    pub preset_or_experience_id: String,
    pub total_volume: i64,
    pub total_flow: f64,
    pub ready: bool,
    pub valves: Vec<ValveState>,
    pub iot_active: String,
}

impl SystemState {
    pub fn is_running(&self) -> bool {
        self.mode == OperatingMode::ShowerInProgress
    }

    pub fn is_warming_up(&self) -> bool {
        self.warmup.status == WarmupStatus::InProgress
    }

    pub fn active_preset_id(&self) -> Option<u32> {
        match self.preset_or_experience_id.trim() {
            "0" => None,
            raw => raw.parse().ok(),
        }
    }
}

impl FromWire for SystemState {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            mode: f.enum_or("currentSystemState", OperatingMode::Normal),
            warmup: f.object("warmUpState"),
            preset_or_experience_id: f.string_or("presetOrExperienceId", "0"),
            total_volume: f.i64_or("totalVolume", 0),
            total_flow: f.f64_or("totalFlow", 0.0),
            ready: f.flag("ready"),
            valves: f.list("valveState"),
            iot_active: f.string_or("ioTActive", "Inactive"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmupState {
    pub warm_up: String,
    pub status: WarmupStatus,
}

impl FromWire for WarmupState {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            warm_up: f.string_or("warmUp", "warmUpDisabled"),
            status: f.enum_or("state", WarmupStatus::NotInProgress),
        }
    }
}

// ── Valves ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValveState {
    pub valve_index: String,
    pub at_flow: bool,
    pub at_temp: bool,
    /// Percent, 0–100. The wire carries half of this.
    pub flow_setpoint: i64,
    pub temperature_setpoint: f64,
    pub error_flag: bool,
    pub error_code: i64,
    pub pause_flag: bool,
    pub out1: bool,
    pub out2: bool,
    pub out3: bool,
    pub outlets: Vec<OutletState>,
}

impl ValveState {
    /// At least one outlet on this valve is open.
    pub fn is_active(&self) -> bool {
        self.out1 || self.out2 || self.out3
    }
}

impl FromWire for ValveState {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            valve_index: f.string("valveIndex"),
            at_flow: f.flag("atFlow"),
            at_temp: f.flag("atTemp"),
            flow_setpoint: flow_percent(f.f64_or("flowSetpoint", 0.0)),
            temperature_setpoint: f.f64_or("temperatureSetpoint", 0.0),
            error_flag: f.flag("errorFlag"),
            error_code: f.i64_or("errorCode", 0),
            pause_flag: f.flag("pauseFlag"),
            out1: f.flag("out1"),
            out2: f.flag("out2"),
            out3: f.flag("out3"),
            outlets: f.list("outlets"),
        }
    }
}

/// Wire flow setpoints are on a 0–50 scale.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn flow_percent(raw: f64) -> i64 {
    (raw * 2.0).round() as i64
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutletState {
    pub outlet_index: String,
    pub temperature: f64,
    pub flow: f64,
}

impl FromWire for OutletState {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            outlet_index: f.string("outletIndex"),
            temperature: f.f64_or("outletTemp", 0.0),
            flow: f.f64_or("outletFlow", 0.0),
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSettings {
    pub valves: Vec<ValveSettings>,
    pub flow_control: String,
}

impl FromWire for DeviceSettings {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            valves: f.list("valveSettings"),
            flow_control: f.string_or("flowControl", "Disabled"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValveSettings {
    pub valve: String,
    pub outlet_count: i64,
    pub firmware_type: i64,
    pub firmware_version: i64,
    pub outlets: Vec<OutletConfiguration>,
}

impl FromWire for ValveSettings {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            valve: f.string_or("valve", "Valve1"),
            outlet_count: f.i64_or("noOfOutlets", 0),
            firmware_type: f.i64_or("valveFirmwareType", 0),
            firmware_version: f.i64_or("valveFirmwareVersion", 0),
            outlets: f.list("outletConfigurations"),
        }
    }
}

/// Per-outlet limits configured on the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutletConfiguration {
    pub outlet_type: i64,
    pub outlet_id: i64,
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub default_temperature: f64,
    pub max_flow: i64,
    pub min_flow: i64,
    pub default_flow: i64,
    /// Seconds.
    pub max_runtime: i64,
}

impl OutletConfiguration {
    pub fn kind(&self) -> Option<OutletType> {
        OutletType::from_code(self.outlet_type)
    }
}

impl FromWire for OutletConfiguration {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            outlet_type: f.i64_or("outLetType", 0),
            outlet_id: f.i64_or("outLetId", 0),
            max_temperature: f.f64_or("maximumOutletTemperature", 48.8),
            min_temperature: f.f64_or("minimumOutletTemperature", 15.0),
            default_temperature: f.f64_or("defaultOutletTemperature", 37.7),
            max_flow: f.i64_or("maximumFlowrate", 100),
            min_flow: f.i64_or("minimumFlowrate", 0),
            default_flow: f.i64_or("defaultFlowrate", 50),
            max_runtime: f.i64_or("maximumRuntime", 1800),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::lenient::decode;

    fn sample() -> serde_json::Value {
        json!({
            "id": "state-1",
            "deviceId": "gcs-123",
            "tenantId": "cust-1",
            "connectionState": "Connected",
            "lastConnected": 1_700_000_000,
            "state": {
                "warmUpState": { "warmUp": "warmUpEnabled", "state": "warmUpInProgress" },
                "currentSystemState": "showerInProgress",
                "presetOrExperienceId": "3",
                "totalVolume": "120",
                "totalFlow": 4.5,
                "ready": "true",
                "ioTActive": "Active",
                "valveState": [{
                    "valveIndex": "Valve1",
                    "atFlow": "1",
                    "atTemp": 0,
                    "flowSetpoint": "25.0",
                    "temperatureSetpoint": "38.5",
                    "errorFlag": false,
                    "errorCode": "0",
                    "pauseFlag": "0",
                    "out1": "1",
                    "out2": "0",
                    "out3": "0",
                    "outlets": [{ "outletIndex": "1", "outletTemp": "38.1", "outletFlow": 50 }]
                }]
            },
            "setting": {
                "flowControl": "Enabled",
                "valveSettings": [{
                    "valve": "Valve1",
                    "noOfOutlets": "2",
                    "outletConfigurations": [{ "outLetType": 11, "outLetId": "1" }]
                }]
            },
            "brandNewField": [1, 2, 3]
        })
    }

    #[test]
    fn parses_full_payload() {
        let state: DeviceState = decode(&sample());
        assert!(state.is_connected());
        assert!(state.is_running());
        assert!(state.is_warming_up());
        assert_eq!(state.active_preset_id(), Some(3));
        assert_eq!(state.system.total_volume, 120);
        assert!(state.system.ready);

        let valve = &state.system.valves[0];
        assert!(valve.is_active());
        assert!(valve.at_flow);
        assert!(!valve.at_temp);
        assert_eq!(valve.flow_setpoint, 50);
        assert!((valve.temperature_setpoint - 38.5).abs() < f64::EPSILON);
        assert!((valve.outlets[0].temperature - 38.1).abs() < f64::EPSILON);

        let outlet = &state.settings.valves[0].outlets[0];
        assert_eq!(outlet.kind(), Some(OutletType::Showerhead));
        assert_eq!(outlet.max_runtime, 1800);
        assert!((outlet.default_temperature - 37.7).abs() < f64::EPSILON);
        assert_eq!(state.settings.valves[0].outlet_count, 2);
    }

    #[test]
    fn out_flags_drive_is_active() {
        let active: ValveState = decode(&json!({ "out1": "1", "out2": "0", "out3": "0" }));
        assert!(active.is_active());

        let idle: ValveState = decode(&json!({ "out1": "0", "out2": "0", "out3": "0" }));
        assert!(!idle.is_active());
    }

    #[test]
    fn flow_setpoint_is_doubled_and_rounded() {
        for (raw, pct) in [(json!(25), 50), (json!("12.3"), 25), (json!(50.0), 100), (json!("junk"), 0)] {
            let v: ValveState = decode(&json!({ "flowSetpoint": raw }));
            assert_eq!(v.flow_setpoint, pct);
        }
    }

    #[test]
    fn unknown_enum_values_fall_back() {
        let state: DeviceState = decode(&json!({
            "connectionState": "Rebooting",
            "state": {
                "currentSystemState": "maintenance",
                "warmUpState": { "state": "somethingNew" }
            }
        }));
        assert_eq!(state.connection, ConnectionStatus::Disconnected);
        assert_eq!(state.system.mode, OperatingMode::Normal);
        assert_eq!(state.system.warmup.status, WarmupStatus::NotInProgress);
        assert_eq!(state.system.warmup.warm_up, "warmUpDisabled");
    }

    #[test]
    fn preset_reference_zero_means_none() {
        for raw in [json!("0"), json!(0), json!("abc"), json!(null)] {
            let s: SystemState = decode(&json!({ "presetOrExperienceId": raw }));
            assert_eq!(s.active_preset_id(), None, "{raw}");
        }
        let s: SystemState = decode(&json!({ "presetOrExperienceId": 2 }));
        assert_eq!(s.active_preset_id(), Some(2));
    }

    #[test]
    fn empty_object_yields_defaults() {
        let state: DeviceState = decode(&json!({}));
        assert_eq!(state.sku, "GCS");
        assert!(!state.is_connected());
        assert!(!state.is_running());
        assert_eq!(state.system.iot_active, "Inactive");
        assert_eq!(state.settings.flow_control, "Disabled");
        assert!(state.system.valves.is_empty());
    }
}
