// Account → Location → Device hierarchy from the customer-device endpoint.

use std::collections::HashSet;

use serde::Serialize;

use crate::lenient::{Fields, FromWire};

pub const DEFAULT_SKU: &str = "GCS";

/// Temperature unit the user picked in the app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

/// Volume unit the user picked in the app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
pub enum FlowUnit {
    Gallons,
    Liters,
    #[default]
    Standard,
}

/// A customer account and everything it owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Account {
    pub id: String,
    pub tenant_id: String,
    pub temperature_unit: TemperatureUnit,
    pub water_units: FlowUnit,
    pub is_active: bool,
    pub locations: Vec<Location>,
    pub created_time: Option<i64>,
}

/// A home; owns zero or more devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub devices: Vec<Device>,
    pub created_time: Option<i64>,
}

/// A shower controller as listed during discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Device {
    pub device_id: String,
    pub logical_name: String,
    pub sku: String,
    pub serial_number: Option<String>,
    pub is_active: bool,
    pub is_provisioned: bool,
    pub ssid: Option<String>,
    pub created_time: Option<i64>,
}

impl Account {
    /// Every device across every location, each id at most once, in
    /// discovery order.
    pub fn devices(&self) -> Vec<&Device> {
        let mut seen = HashSet::new();
        self.locations
            .iter()
            .flat_map(|loc| loc.devices.iter())
            .filter(|d| seen.insert(d.device_id.as_str()))
            .collect()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.locations
            .iter()
            .flat_map(|loc| loc.devices.iter())
            .find(|d| d.device_id == device_id)
    }
}

impl FromWire for Account {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            id: f.string("id"),
            tenant_id: f.string("tenantId"),
            temperature_unit: f.enum_or("temperatureUnit", TemperatureUnit::Fahrenheit),
            water_units: f.enum_or("waterUnits", FlowUnit::Standard),
            is_active: f.flag("isActive"),
            locations: f.list("customerHome"),
            created_time: f.opt_i64("createdTime"),
        }
    }
}

impl FromWire for Location {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            id: f.string("homeId"),
            name: f.string("homeName"),
            address: f.opt_string("address"),
            latitude: f.opt_f64("homeLatitude"),
            longitude: f.opt_f64("homeLongitude"),
            devices: f.list("devices"),
            created_time: f.opt_i64("createdTime"),
        }
    }
}

impl FromWire for Device {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            device_id: f.string("deviceId"),
            logical_name: f.string("logicalName"),
            sku: f.string_or("sku", DEFAULT_SKU),
            serial_number: f.opt_string("serialNumber"),
            is_active: f.flag("isActive"),
            is_provisioned: f.flag("isProvisioned"),
            ssid: f.opt_string("ssid"),
            created_time: f.opt_i64("createdTime"),
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

    fn device(id: &str) -> serde_json::Value {
        json!({ "deviceId": id, "logicalName": format!("Shower {id}"), "isActive": "true" })
    }

    #[test]
    fn two_locations_flatten_to_three_devices() {
        let body = json!({
            "id": "cust-1",
            "tenantId": "cust-1",
            "customerHome": [
                { "homeId": "h1", "homeName": "Home", "devices": [device("d1")] },
                { "homeId": "h2", "homeName": "Cabin", "devices": [device("d2"), device("d3")] }
            ]
        });

        let account: Account = decode(&body);
        let ids: Vec<&str> = account.devices().iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn flattening_handles_empty_and_duplicate_locations() {
        let body = json!({
            "customerHome": [
                { "homeId": "empty", "devices": [] },
                { "homeId": "nodevices" },
                { "homeId": "a", "devices": [device("d1"), device("d2")] },
                { "homeId": "b", "devices": [device("d2")] }
            ]
        });

        let account: Account = decode(&body);
        let ids: Vec<&str> = account.devices().iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);
        assert_eq!(account.locations.len(), 4);
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let account: Account = decode(&json!({ "id": "x", "unexpected": { "nested": 1 } }));
        assert_eq!(account.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(account.water_units, FlowUnit::Standard);
        assert!(account.locations.is_empty());
        assert!(!account.is_active);

        let d: Device = decode(&json!({ "deviceId": "d1" }));
        assert_eq!(d.sku, "GCS");
        assert!(d.serial_number.is_none());
    }

    #[test]
    fn units_parse_known_values() {
        let account: Account = decode(&json!({
            "temperatureUnit": "Celsius",
            "waterUnits": "Liters"
        }));
        assert_eq!(account.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(account.water_units, FlowUnit::Liters);

        let account: Account = decode(&json!({ "temperatureUnit": "Kelvin" }));
        assert_eq!(account.temperature_unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn device_lookup() {
        let account: Account = decode(&json!({
            "customerHome": [{ "homeId": "h", "devices": [device("abc")] }]
        }));
        assert_eq!(account.device("abc").unwrap().logical_name, "Shower abc");
        assert!(account.device("nope").is_none());
    }
}
