use serde::Serialize;

use crate::lenient::{Fields, FromWire};
use crate::model::account::DEFAULT_SKU;

/// Presets and experiences stored on one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresetList {
    pub device_id: String,
    pub sku: String,
    pub tenant_id: String,
    pub presets: Vec<Preset>,
}

impl PresetList {
    pub fn get(&self, preset_id: u32) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id() == Some(preset_id))
    }

    pub fn experiences(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter().filter(|p| p.is_experience)
    }

    pub fn presets_only(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter().filter(|p| !p.is_experience)
    }
}

impl FromWire for PresetList {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            device_id: f.string("deviceId"),
            sku: f.string_or("sku", DEFAULT_SKU),
            tenant_id: f.string("tenantId"),
            presets: f.list("presets"),
        }
    }
}

/// A saved shower; an experience is a preset with scripted steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preset {
    pub preset_id: String,
    pub title: String,
    pub logical_name: String,
    pub is_experience: bool,
    pub pause_flag: String,
    pub state: String,
    pub timestamp: Option<i64>,
    /// Seconds.
    pub duration: i64,
    pub valves: Vec<ValveDetail>,
}

impl Preset {
    /// Numeric id, if the wire id is numeric.
    pub fn id(&self) -> Option<u32> {
        self.preset_id.trim().parse().ok()
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration / 60
    }
}

impl FromWire for Preset {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            preset_id: f.string("presetId"),
            title: f.string("title"),
            logical_name: f.string("logicalName"),
            is_experience: f.flag("isExperience"),
            pause_flag: f.string_or("pauseFlag", "off"),
            state: f.string_or("state", "off"),
            timestamp: f.opt_i64("timestamp"),
            duration: f.i64_or("time", 1800),
            valves: f.list("valveDetails"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValveDetail {
    pub valve_index: String,
    pub hex_string: Option<String>,
    pub outlets: Vec<OutletDetail>,
}

impl FromWire for ValveDetail {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            valve_index: f.string("valveIndex"),
            hex_string: f.opt_string("hexString"),
            outlets: f.list("outlets"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutletDetail {
    pub outlet_index: String,
    pub temperature: f64,
    pub flow: i64,
    pub enabled: bool,
}

impl FromWire for OutletDetail {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            outlet_index: f.string("outletIndex"),
            temperature: f.f64_or("temperature", 37.7),
            flow: f.i64_or("flow", 50),
            enabled: f.flag("value"),
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

    #[test]
    fn splits_presets_and_experiences() {
        let list: PresetList = decode(&json!({
            "deviceId": "gcs-1",
            "presets": [
                { "presetId": "1", "title": "Morning", "time": "600" },
                { "presetId": "2", "title": "Spa", "isExperience": "True" },
                { "presetId": "x", "title": "Broken" }
            ]
        }));

        assert_eq!(list.presets.len(), 3);
        assert_eq!(list.get(1).unwrap().title, "Morning");
        assert_eq!(list.get(1).unwrap().duration_minutes(), 10);
        assert_eq!(list.get(2).unwrap().duration, 1800);
        assert!(list.get(9).is_none());
        assert_eq!(list.experiences().count(), 1);
        assert_eq!(list.presets_only().count(), 2);
        assert_eq!(list.presets[2].id(), None);
    }

    #[test]
    fn outlet_details_default_sensibly() {
        let valve: ValveDetail = decode(&json!({
            "valveIndex": "Valve1",
            "hexString": "01266401",
            "outlets": [
                { "outletIndex": "1", "value": "1" },
                { "outletIndex": "2", "temperature": "40.5", "flow": "80", "value": 0 }
            ]
        }));

        assert_eq!(valve.hex_string.as_deref(), Some("01266401"));
        let first = &valve.outlets[0];
        assert!(first.enabled);
        assert!((first.temperature - 37.7).abs() < f64::EPSILON);
        assert_eq!(first.flow, 50);
        let second = &valve.outlets[1];
        assert!(!second.enabled);
        assert_eq!(second.flow, 80);
    }
}
