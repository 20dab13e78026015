// ── Runtime session configuration ──
//
// Everything needed to open a session against the Anthem cloud. Carries
// credentials and tuning, but never touches disk: the CLI (through
// anthem-config) builds a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use anthem_api::config::{DEFAULT_AUTH_POLICY, DEFAULT_AUTH_TENANT};
use anthem_api::model::DEFAULT_SKU;
use anthem_api::{ApiConfig, AuthConfig, CommandEncoding, RealtimeConfig, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// Account login for the identity provider.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Configuration for one account session.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API gateway base URL.
    pub base_url: Url,
    /// APIM subscription key sent with every API request.
    pub subscription_key: SecretString,
    pub credentials: AccountCredentials,
    /// B2C application (client) id.
    pub client_id: String,
    /// API resource segment of the access scope.
    pub api_resource: String,
    pub auth_tenant: String,
    pub auth_policy: String,
    /// Explicit token endpoint, overriding tenant/policy derivation.
    pub token_url: Option<Url>,
    /// Account id; read from the access token when `None`.
    pub customer_id: Option<String>,
    /// SKU for devices the account listing does not describe.
    pub sku: String,
    pub encoding: CommandEncoding,
    pub timeout: Duration,
    pub ca_cert: Option<PathBuf>,
    /// Open the MQTT notification channel on `open()`.
    pub realtime_enabled: bool,
    /// Stable mobile-device id for realtime registration; random when `None`.
    pub mobile_device_id: Option<String>,
    pub realtime: RealtimeConfig,
}

impl ControllerConfig {
    pub fn new(
        base_url: Url,
        subscription_key: SecretString,
        credentials: AccountCredentials,
        client_id: impl Into<String>,
        api_resource: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            subscription_key,
            credentials,
            client_id: client_id.into(),
            api_resource: api_resource.into(),
            auth_tenant: DEFAULT_AUTH_TENANT.into(),
            auth_policy: DEFAULT_AUTH_POLICY.into(),
            token_url: None,
            customer_id: None,
            sku: DEFAULT_SKU.into(),
            encoding: CommandEncoding::default(),
            timeout: Duration::from_secs(30),
            ca_cert: None,
            realtime_enabled: true,
            mobile_device_id: None,
            realtime: RealtimeConfig::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            ca_cert: self.ca_cert.clone(),
        }
    }

    pub(crate) fn auth_config(&self) -> AuthConfig {
        let mut auth = AuthConfig::new(
            self.credentials.username.clone(),
            self.credentials.password.clone(),
            self.client_id.clone(),
            self.api_resource.clone(),
        );
        auth.tenant.clone_from(&self.auth_tenant);
        auth.policy.clone_from(&self.auth_policy);
        auth.token_url.clone_from(&self.token_url);
        auth
    }

    pub(crate) fn api_config(&self) -> ApiConfig {
        let mut api = ApiConfig::new(self.base_url.clone(), self.subscription_key.clone())
            .with_encoding(self.encoding);
        api.sku.clone_from(&self.sku);
        api.transport = self.transport();
        api
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ControllerConfig {
        ControllerConfig::new(
            Url::parse("https://api.example.com").unwrap(),
            SecretString::from("key"),
            AccountCredentials {
                username: "me@example.com".into(),
                password: SecretString::from("pw"),
            },
            "client",
            "resource",
        )
    }

    #[test]
    fn api_config_carries_session_choices() {
        let mut cfg = config();
        cfg.encoding = CommandEncoding::Scaled;
        cfg.sku = "GCS2".into();
        cfg.timeout = Duration::from_secs(5);

        let api = cfg.api_config();
        assert_eq!(api.encoding, CommandEncoding::Scaled);
        assert_eq!(api.sku, "GCS2");
        assert_eq!(api.transport.timeout, Duration::from_secs(5));
        assert_eq!(api.base_url.as_str(), "https://api.example.com/");
    }

    #[test]
    fn auth_config_honors_overrides() {
        let mut cfg = config();
        cfg.auth_tenant = "tenant.onmicrosoft.com".into();
        let auth = cfg.auth_config();
        assert!(auth.token_url().unwrap().as_str().starts_with("https://tenant.b2clogin.com/"));
        assert_eq!(auth.username, "me@example.com");
    }
}
