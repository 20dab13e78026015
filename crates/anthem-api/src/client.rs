// Authenticated request gateway for the Anthem cloud API.
//
// Every request carries a bearer token from the shared `TokenManager` and
// the APIM subscription key. Responses are classified into the crate's
// error taxonomy; successful bodies are returned as decoded JSON and
// mapped onto domain types with the lenient decoder.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::TokenManager;
use crate::config::{ApiConfig, expand};
use crate::error::{Error, preview};
use crate::lenient::decode;
use crate::model::command::{
    MobileRegistrationBody, PresetCommandBody, ValveCommandBody,
};
use crate::model::{
    Account, CommandAck, Device, DeviceState, DeviceTarget, IotHubSettings, PresetAction,
    PresetList,
};
use crate::valve::{
    CommandEncoding, CommandWord, DEFAULT_FLOW_PERCENT, DEFAULT_TEMPERATURE_C, Outlet,
    ValveControl, ValvePrefix,
};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Preset a warmup runs against when the caller does not pick one.
pub const DEFAULT_WARMUP_PRESET: u32 = 1;

// ── Client ──────────────────────────────────────────────────────────

/// Async client for the Anthem REST API.
///
/// Cheap to share behind an `Arc`; the token manager may be shared with
/// other clients for the same account.
#[derive(Debug)]
pub struct AnthemClient {
    http: reqwest::Client,
    config: ApiConfig,
    tokens: Arc<TokenManager>,
}

impl AnthemClient {
    // ── Constructors ────────────────────────────────────────────────

    /// Build the HTTP client from `config.transport`, injecting the
    /// subscription key as a default header.
    pub fn new(config: ApiConfig, tokens: Arc<TokenManager>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(config.subscription_key.expose_secret()).map_err(
            |e| Error::Validation {
                field: "subscription_key",
                message: format!("not a valid header value: {e}"),
            },
        )?;
        key.set_sensitive(true);
        headers.insert(SUBSCRIPTION_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = config.transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages default headers).
    pub fn from_reqwest(config: ApiConfig, tokens: Arc<TokenManager>, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn encoding(&self) -> CommandEncoding {
        self.config.encoding
    }

    /// Target `device_id` under `tenant_id` with the configured SKU.
    pub fn target(&self, tenant_id: &str, device_id: &str) -> DeviceTarget {
        DeviceTarget::new(tenant_id, device_id).with_sku(self.config.sku.clone())
    }

    // ── Gateway ─────────────────────────────────────────────────────

    /// Send an authenticated request and return the decoded JSON body.
    ///
    /// An empty success body decodes to `Value::Null`.
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        self.send(method, endpoint, query, body).await
    }

    fn url(&self, endpoint: &str) -> Result<Url, Error> {
        let raw = format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| Error::Validation {
            field: "endpoint",
            message: format!("{raw}: {e}"),
        })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&B>,
    ) -> Result<Value, Error> {
        let credential = self.tokens.ensure_valid().await?;
        let url = self.url(endpoint)?;
        debug!("{method} {url}");

        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(credential.access_token.expose_secret());
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| Error::transport(endpoint, e))?;
        Self::handle_response(endpoint, resp).await
    }

    async fn handle_response(endpoint: &str, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::transport(endpoint, e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "response from {endpoint}");

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
                body: Some(body).filter(|b| !b.is_empty()),
            });
        }

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned()
            } else {
                preview(&body)
            };
            return Err(Error::Api {
                message,
                status: Some(status.as_u16()),
                body: Some(body),
                source: None,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Api {
            message: format!("response is not JSON ({e}): {}", preview(&body)),
            status: Some(status.as_u16()),
            body: Some(body),
            source: None,
        })
    }

    async fn command<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<CommandAck, Error> {
        let value = self.send(Method::POST, endpoint, None, Some(body)).await?;
        Ok(decode(&value))
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Account ─────────────────────────────────────────────────────

    /// Account id of the authenticated user, read from the access token.
    pub async fn customer_id(&self) -> Result<String, Error> {
        let credential = self.tokens.ensure_valid().await?;
        credential.subject().ok_or_else(|| Error::Authentication {
            message: "access token carries no account id".into(),
            status: None,
            body: None,
        })
    }

    pub async fn get_customer(&self, customer_id: &str) -> Result<Account, Error> {
        let path = expand(
            &self.config.endpoints.customer_devices,
            "customer_id",
            customer_id,
        )?;
        let value = self.send::<Value>(Method::GET, &path, None, None).await?;
        Ok(decode(&value))
    }

    /// Every device across all of the customer's locations.
    pub async fn discover_devices(&self, customer_id: &str) -> Result<Vec<Device>, Error> {
        let account = self.get_customer(customer_id).await?;
        Ok(account.devices().into_iter().cloned().collect())
    }

    // ── Device state ────────────────────────────────────────────────

    pub async fn get_device_state(&self, device_id: &str) -> Result<DeviceState, Error> {
        let path = expand(&self.config.endpoints.device_state, "device_id", device_id)?;
        let value = self.send::<Value>(Method::GET, &path, None, None).await?;
        Ok(decode(&value))
    }

    pub async fn get_presets(&self, device_id: &str) -> Result<PresetList, Error> {
        let path = expand(&self.config.endpoints.presets, "device_id", device_id)?;
        let value = self.send::<Value>(Method::GET, &path, None, None).await?;
        Ok(decode(&value))
    }

    // ── Presets and warmup ──────────────────────────────────────────

    pub async fn start_preset(&self, target: &DeviceTarget, preset_id: u32) -> Result<CommandAck, Error> {
        let body = PresetCommandBody::new(target, preset_id, PresetAction::Start);
        self.command(&self.config.endpoints.preset_control, &body).await
    }

    pub async fn stop_preset(&self, target: &DeviceTarget, preset_id: u32) -> Result<CommandAck, Error> {
        let body = PresetCommandBody::new(target, preset_id, PresetAction::Stop);
        self.command(&self.config.endpoints.preset_control, &body).await
    }

    /// Warm the water for `preset_id` ([`DEFAULT_WARMUP_PRESET`] when `None`).
    pub async fn start_warmup(
        &self,
        target: &DeviceTarget,
        preset_id: Option<u32>,
    ) -> Result<CommandAck, Error> {
        let preset_id = preset_id.unwrap_or(DEFAULT_WARMUP_PRESET);
        let body = PresetCommandBody::new(target, preset_id, PresetAction::Start);
        self.command(&self.config.endpoints.warmup, &body).await
    }

    pub async fn stop_warmup(
        &self,
        target: &DeviceTarget,
        preset_id: Option<u32>,
    ) -> Result<CommandAck, Error> {
        let preset_id = preset_id.unwrap_or(DEFAULT_WARMUP_PRESET);
        let body = PresetCommandBody::new(target, preset_id, PresetAction::Stop);
        self.command(&self.config.endpoints.warmup, &body).await
    }

    // ── Valve control ───────────────────────────────────────────────

    /// Send one command word per valve; valves not present are sent as off.
    pub async fn control_valves(
        &self,
        target: &DeviceTarget,
        control: &ValveControl,
    ) -> Result<CommandAck, Error> {
        let body = ValveCommandBody {
            tenant_id: &target.tenant_id,
            device_id: &target.device_id,
            gcs_valve_control_model: control,
            sku: &target.sku,
        };
        self.command(&self.config.endpoints.valve_control, &body).await
    }

    async fn primary(&self, target: &DeviceTarget, word: CommandWord) -> Result<CommandAck, Error> {
        self.control_valves(target, &ValveControl::single(ValvePrefix::Primary, word))
            .await
    }

    /// Open `outlet` on the primary valve.
    pub async fn turn_on_outlet(
        &self,
        target: &DeviceTarget,
        outlet: Outlet,
        temperature_celsius: f64,
        flow_percent: f64,
    ) -> Result<CommandAck, Error> {
        let word = self.config.encoding.outlet(
            outlet,
            temperature_celsius,
            flow_percent,
            ValvePrefix::Primary,
        )?;
        self.primary(target, word).await
    }

    pub async fn turn_off(&self, target: &DeviceTarget) -> Result<CommandAck, Error> {
        self.primary(target, CommandWord::OFF).await
    }

    /// Run `outlet` at `temperature_celsius`. Flow defaults to
    /// [`DEFAULT_FLOW_PERCENT`].
    pub async fn set_temperature(
        &self,
        target: &DeviceTarget,
        temperature_celsius: f64,
        outlet: Outlet,
        flow_percent: Option<f64>,
    ) -> Result<CommandAck, Error> {
        let flow = flow_percent.unwrap_or(DEFAULT_FLOW_PERCENT);
        self.turn_on_outlet(target, outlet, temperature_celsius, flow)
            .await
    }

    /// Run `outlet` at `flow_percent`. Temperature defaults to
    /// [`DEFAULT_TEMPERATURE_C`].
    pub async fn set_flow(
        &self,
        target: &DeviceTarget,
        flow_percent: f64,
        outlet: Outlet,
        temperature_celsius: Option<f64>,
    ) -> Result<CommandAck, Error> {
        let temperature = temperature_celsius.unwrap_or(DEFAULT_TEMPERATURE_C);
        self.turn_on_outlet(target, outlet, temperature, flow_percent)
            .await
    }

    /// Stop water on the primary valve, keeping the session alive.
    pub async fn pause(
        &self,
        target: &DeviceTarget,
        temperature_celsius: f64,
        flow_percent: f64,
    ) -> Result<CommandAck, Error> {
        let word = self.config.encoding.pause(
            temperature_celsius,
            flow_percent,
            ValvePrefix::Primary,
        )?;
        self.primary(target, word).await
    }

    // ── Realtime registration ───────────────────────────────────────

    /// Register this client as a mobile device and obtain IoT hub
    /// credentials for the realtime channel.
    ///
    /// A random 16-hex-character id is generated when `mobile_device_id`
    /// is `None`.
    pub async fn register_mobile_device(
        &self,
        tenant_id: &str,
        mobile_device_id: Option<&str>,
    ) -> Result<IotHubSettings, Error> {
        let generated;
        let mobile_device_id = match mobile_device_id {
            Some(id) => id,
            None => {
                generated = generate_mobile_id();
                generated.as_str()
            }
        };

        let body = MobileRegistrationBody::new(tenant_id, mobile_device_id);
        let value = self
            .send(
                Method::POST,
                &self.config.endpoints.mobile_settings,
                None,
                Some(&body),
            )
            .await?;

        IotHubSettings::from_registration(&value).ok_or_else(|| Error::Api {
            message: "registration response has no usable ioTHubSettings".into(),
            status: None,
            body: Some(value.to_string()),
            source: None,
        })
    }
}

fn generate_mobile_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
