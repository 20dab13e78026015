// Command payloads and the acknowledgement the API returns for them.

use secrecy::SecretString;
use serde::Serialize;

use crate::lenient::{Fields, FromWire};
use crate::model::account::DEFAULT_SKU;
use crate::valve::ValveControl;

/// The device a command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub tenant_id: String,
    pub device_id: String,
    pub sku: String,
}

impl DeviceTarget {
    pub fn new(tenant_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            device_id: device_id.into(),
            sku: DEFAULT_SKU.into(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }
}

/// Receipt for an accepted command. Acceptance is not completion: the
/// device applies it asynchronously.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub correlation_id: String,
    pub timestamp: i64,
}

impl FromWire for CommandAck {
    fn from_wire(f: &Fields<'_>) -> Self {
        Self {
            correlation_id: f.string("correlationId"),
            timestamp: f.i64_or("timestamp", 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetAction {
    Start,
    Stop,
}

// ── Request bodies ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresetCommandBody<'a> {
    pub tenant_id: &'a str,
    pub device_id: &'a str,
    pub preset_id: String,
    pub command: PresetAction,
    pub sku: &'a str,
}

impl<'a> PresetCommandBody<'a> {
    pub fn new(target: &'a DeviceTarget, preset_id: u32, command: PresetAction) -> Self {
        Self {
            tenant_id: &target.tenant_id,
            device_id: &target.device_id,
            preset_id: preset_id.to_string(),
            command,
            sku: &target.sku,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValveCommandBody<'a> {
    pub tenant_id: &'a str,
    pub device_id: &'a str,
    pub gcs_valve_control_model: &'a ValveControl,
    pub sku: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MobileRegistrationBody<'a> {
    pub tenant_id: &'a str,
    pub mobile_device_id: &'a str,
    pub username: &'static str,
    pub os: &'static str,
    pub device_platform: &'static str,
    pub device_handle: String,
    pub tags: [&'static str; 1],
}

impl<'a> MobileRegistrationBody<'a> {
    pub fn new(tenant_id: &'a str, mobile_device_id: &'a str) -> Self {
        Self {
            tenant_id,
            mobile_device_id,
            username: "HomeAssistant",
            os: "Android",
            device_platform: "FirebaseCloudMessagingV1",
            device_handle: format!("ha_{mobile_device_id}"),
            tags: ["FirmwareUpdate"],
        }
    }
}

// ── IoT hub registration ────────────────────────────────────────────

/// Credentials for the realtime channel, issued by the mobile-settings
/// endpoint.
#[derive(Debug, Clone)]
pub struct IotHubSettings {
    pub hub: String,
    pub device_id: String,
    pub username: String,
    /// Shared-access-signature token used as the MQTT password.
    pub password: SecretString,
    pub connection_string: Option<SecretString>,
}

impl IotHubSettings {
    /// `None` when the response lacks the host or device id.
    pub fn from_registration(value: &serde_json::Value) -> Option<Self> {
        let f = Fields::new(value);
        let settings = f.raw("ioTHubSettings").map(Fields::new)?;

        let hub = settings.opt_string("ioTHub").filter(|h| !h.is_empty())?;
        let device_id = settings.opt_string("deviceId").filter(|d| !d.is_empty())?;
        Some(Self {
            username: settings.string("username"),
            password: SecretString::from(settings.string("password")),
            connection_string: settings.opt_string("connectionString").map(SecretString::from),
            hub,
            device_id,
        })
    }
}
