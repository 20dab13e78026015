// ── Gateway and identity-provider configuration ──
//
// Everything the client needs to know about the cloud lives here and is
// handed in at construction. Nothing is read from process-wide state.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::model::DEFAULT_SKU;
use crate::transport::TransportConfig;
use crate::valve::CommandEncoding;

pub const DEFAULT_BASE_URL: &str = "https://api-kohler-us.kohler.io";
pub const DEFAULT_AUTH_TENANT: &str = "konnectkohler.onmicrosoft.com";
pub const DEFAULT_AUTH_POLICY: &str = "B2C_1_ROPC_Auth";

// ── Endpoint templates ──────────────────────────────────────────────

/// Path templates relative to the API base URL.
///
/// Placeholders: `{customer_id}`, `{device_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub customer_devices: String,
    pub device_state: String,
    pub presets: String,
    pub preset_control: String,
    pub warmup: String,
    pub valve_control: String,
    pub mobile_settings: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            customer_devices: "/devices/api/v1/device-management/customer-device/{customer_id}"
                .into(),
            device_state: "/devices/api/v1/device-management/gcs-state/gcsadvancestate/{device_id}"
                .into(),
            presets: "/devices/api/v1/device-management/gcs-preset/{device_id}".into(),
            preset_control: "/platform/api/v1/commands/gcs/controlpresetorexperience".into(),
            warmup: "/platform/api/v1/commands/gcs/warmup".into(),
            valve_control: "/platform/api/v1/commands/gcs/solowritesystem".into(),
            mobile_settings: "/platform/api/v1/mobile/settings".into(),
        }
    }
}

/// Substitute `{name}` in `template` with a path-safe identifier.
pub fn expand(template: &str, name: &str, value: &str) -> Result<String, Error> {
    if value.is_empty() || value.contains(&['/', '?', '#', '%'][..]) || value.trim() != value {
        return Err(Error::Validation {
            field: "identifier",
            message: format!("'{value}' is not a valid {name}"),
        });
    }
    Ok(template.replace(&format!("{{{name}}}"), value))
}

// ── API gateway ─────────────────────────────────────────────────────

/// Configuration for [`AnthemClient`](crate::AnthemClient).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    /// Azure API Management subscription key.
    pub subscription_key: SecretString,
    pub endpoints: Endpoints,
    /// SKU used when a command target does not name one.
    pub sku: String,
    /// Command-word packing used for every valve command in this session.
    pub encoding: CommandEncoding,
    pub transport: TransportConfig,
}

impl ApiConfig {
    /// Default endpoints, SKU, encoding, and transport against `base_url`.
    pub fn new(base_url: Url, subscription_key: SecretString) -> Self {
        Self {
            base_url,
            subscription_key,
            endpoints: Endpoints::default(),
            sku: DEFAULT_SKU.into(),
            encoding: CommandEncoding::default(),
            transport: TransportConfig::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: CommandEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

// ── Identity provider ───────────────────────────────────────────────

/// Azure AD B2C resource-owner-password settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: SecretString,
    /// B2C application (client) id.
    pub client_id: String,
    /// API resource segment of the access scope.
    pub api_resource: String,
    /// B2C tenant, e.g. `konnectkohler.onmicrosoft.com`.
    pub tenant: String,
    /// B2C user-flow policy.
    pub policy: String,
    /// Explicit token endpoint; derived from tenant and policy when `None`.
    pub token_url: Option<Url>,
}

impl AuthConfig {
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        client_id: impl Into<String>,
        api_resource: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            client_id: client_id.into(),
            api_resource: api_resource.into(),
            tenant: DEFAULT_AUTH_TENANT.into(),
            policy: DEFAULT_AUTH_POLICY.into(),
            token_url: None,
        }
    }

    /// `https://{prefix}.b2clogin.com/tfp/{tenant}/{policy}/oauth2/v2.0/token`
    pub fn token_url(&self) -> Result<Url, Error> {
        if let Some(ref url) = self.token_url {
            return Ok(url.clone());
        }
        let prefix = self.tenant.split('.').next().unwrap_or_default();
        let raw = format!(
            "https://{prefix}.b2clogin.com/tfp/{}/{}/oauth2/v2.0/token",
            self.tenant, self.policy
        );
        Url::parse(&raw).map_err(|e| Error::Validation {
            field: "auth tenant",
            message: format!("{raw}: {e}"),
        })
    }

    pub fn scope(&self) -> String {
        format!(
            "openid offline_access https://{}/{}/apiaccess",
            self.tenant, self.api_resource
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn auth() -> AuthConfig {
        AuthConfig::new("me@example.com", "pw".to_string().into(), "client", "resource-id")
    }

    #[test]
    fn token_url_derives_from_tenant() {
        assert_eq!(
            auth().token_url().unwrap().as_str(),
            "https://konnectkohler.b2clogin.com/tfp/konnectkohler.onmicrosoft.com/B2C_1_ROPC_Auth/oauth2/v2.0/token"
        );
    }

    #[test]
    fn explicit_token_url_wins() {
        let mut cfg = auth();
        cfg.token_url = Some(Url::parse("http://127.0.0.1:9/token").unwrap());
        assert_eq!(cfg.token_url().unwrap().as_str(), "http://127.0.0.1:9/token");
    }

    #[test]
    fn scope_names_the_api_resource() {
        assert_eq!(
            auth().scope(),
            "openid offline_access https://konnectkohler.onmicrosoft.com/resource-id/apiaccess"
        );
    }

    #[test]
    fn expand_fills_placeholders() {
        let path = expand(&Endpoints::default().device_state, "device_id", "gcs-123").unwrap();
        assert_eq!(path, "/devices/api/v1/device-management/gcs-state/gcsadvancestate/gcs-123");
    }

    #[test]
    fn expand_rejects_path_breaking_ids() {
        for bad in ["", "a/b", "a?b", "a#b", " a", "50%"] {
            assert!(expand("/x/{device_id}", "device_id", bad).is_err(), "{bad:?}");
        }
    }
}
