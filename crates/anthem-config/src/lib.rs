//! Shared configuration for the anthem CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `anthem_core::ControllerConfig`. The CLI layers its
//! flag overrides on top of what this crate produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use anthem_core::{AccountCredentials, CommandEncoding, ControllerConfig};

const KEYRING_SERVICE: &str = "anthem";
const DEFAULT_BASE_URL: &str = "https://api-kohler-us.kohler.io";

pub const PASSWORD_ENV: &str = "ANTHEM_PASSWORD";
pub const SUBSCRIPTION_KEY_ENV: &str = "ANTHEM_SUBSCRIPTION_KEY";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    ProfileNotFound { profile: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials {
        profile: String,
        secret: &'static str,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                profile: name.into(),
            })
    }

    /// Render as TOML with plaintext secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut profiles = HashMap::new();
        for (name, profile) in &self.profiles {
            profiles.insert(name.clone(), profile.redacted());
        }
        let redacted = Config {
            default_profile: self.default_profile.clone(),
            defaults: self.defaults.clone(),
            profiles,
        };
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account login (email).
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or `ANTHEM_PASSWORD`).
    pub password: Option<String>,

    /// Identity provider application id.
    pub client_id: Option<String>,

    /// API resource segment of the access scope.
    pub api_resource: Option<String>,

    /// APIM subscription key (plaintext, prefer keyring or env var).
    pub subscription_key: Option<String>,

    /// Environment variable name containing the subscription key.
    pub subscription_key_env: Option<String>,

    /// API gateway base URL.
    pub base_url: Option<String>,

    /// B2C tenant (e.g. "example.onmicrosoft.com").
    pub auth_tenant: Option<String>,

    /// B2C sign-in policy.
    pub auth_policy: Option<String>,

    /// Explicit token endpoint; overrides tenant/policy.
    pub token_url: Option<String>,

    /// Account id; read from the access token when unset.
    pub customer_id: Option<String>,

    /// SKU for devices the account listing does not describe.
    pub sku: Option<String>,

    /// Valve command word generation: "legacy" or "scaled".
    pub encoding: Option<CommandEncoding>,

    /// Stable id for realtime registration.
    pub mobile_device_id: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "********".to_owned());
        Self {
            password: mask(&self.password),
            subscription_key: mask(&self.subscription_key),
            ..self.clone()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "anthem", "anthem").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("anthem");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ANTHEM_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Credential resolution ───────────────────────────────────────────

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))
        .ok()
        .and_then(|entry| entry.get_password().ok())
}

/// Resolve the account password: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(profile, profile_name, env_var)
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 2. Keyring
    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok(SecretString::from(pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: "password",
    })
}

/// Resolve the APIM subscription key: the profile's named env var, then
/// `ANTHEM_SUBSCRIPTION_KEY`, then keyring, then plaintext.
pub fn resolve_subscription_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_subscription_key_with(profile, profile_name, env_var)
}

fn resolve_subscription_key_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's subscription_key_env, then the well-known name
    let named = profile
        .subscription_key_env
        .as_deref()
        .and_then(&env)
        .or_else(|| env(SUBSCRIPTION_KEY_ENV));
    if let Some(key) = named {
        return Ok(SecretString::from(key));
    }

    // 2. Keyring
    if let Some(key) = keyring_secret(profile_name, "subscription-key") {
        return Ok(SecretString::from(key));
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.subscription_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: "subscription key",
    })
}

// ── Profile translation ─────────────────────────────────────────────

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, ConfigError> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: field.into(),
            reason: "missing from profile".into(),
        })
}

fn parse_url(value: &str, field: &str) -> Result<url::Url, ConfigError> {
    value.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {value}"),
    })
}

/// Build a `ControllerConfig` from a profile, with no CLI flag overrides.
///
/// Realtime stays enabled; one-shot consumers turn it off themselves.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ControllerConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    let subscription_key = resolve_subscription_key(profile, profile_name)?;
    build_controller_config(profile, password, subscription_key)
}

fn build_controller_config(
    profile: &Profile,
    password: SecretString,
    subscription_key: SecretString,
) -> Result<ControllerConfig, ConfigError> {
    let username = required(profile.username.as_ref(), "username")?;
    let client_id = required(profile.client_id.as_ref(), "client_id")?;
    let api_resource = required(profile.api_resource.as_ref(), "api_resource")?;
    let base_url = parse_url(
        profile.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        "base_url",
    )?;

    let mut config = ControllerConfig::new(
        base_url,
        subscription_key,
        AccountCredentials {
            username: username.to_owned(),
            password,
        },
        client_id,
        api_resource,
    );

    if let Some(ref tenant) = profile.auth_tenant {
        config.auth_tenant.clone_from(tenant);
    }
    if let Some(ref policy) = profile.auth_policy {
        config.auth_policy.clone_from(policy);
    }
    if let Some(ref token_url) = profile.token_url {
        config.token_url = Some(parse_url(token_url, "token_url")?);
    }
    if let Some(ref sku) = profile.sku {
        config.sku.clone_from(sku);
    }
    if let Some(encoding) = profile.encoding {
        config.encoding = encoding;
    }
    config.customer_id.clone_from(&profile.customer_id);
    config.mobile_device_id.clone_from(&profile.mobile_device_id);
    config.ca_cert.clone_from(&profile.ca_cert);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));

    Ok(config)
}
