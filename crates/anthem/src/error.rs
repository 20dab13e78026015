//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use anthem_config::ConfigError;
use anthem_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Anthem cloud")]
    #[diagnostic(
        code(anthem::connection_failed),
        help("Check your network connection and the profile's base_url.\n{reason}")
    )]
    ConnectionFailed { reason: String },

    #[error("Realtime channel failed: {message}")]
    #[diagnostic(code(anthem::realtime))]
    Realtime { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(anthem::auth_failed),
        help(
            "Verify the username, password, client_id and api_resource of profile '{profile}'.\n\
             The password can also come from ANTHEM_PASSWORD."
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No {secret} configured for profile '{profile}'")]
    #[diagnostic(
        code(anthem::no_credentials),
        help(
            "Store it in the system keyring under service 'anthem',\n\
             set ANTHEM_PASSWORD / ANTHEM_SUBSCRIPTION_KEY,\n\
             or add it to the profile in the config file."
        )
    )]
    NoCredentials { profile: String, secret: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(anthem::not_found),
        help("Run: anthem {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", status_suffix(.status.as_ref()))]
    #[diagnostic(code(anthem::api_error))]
    ApiError {
        status: Option<u16>,
        message: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(anthem::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(anthem::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Config file: {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(anthem::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(anthem::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(anthem::render))]
    Render(String),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

fn status_suffix(status: Option<&u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Realtime { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Fill in the profile and timeout of the session the error came from.
    pub fn in_session(self, profile: &str, timeout_secs: u64) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.into(),
                message,
            },
            Self::Timeout { .. } => Self::Timeout {
                seconds: timeout_secs,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message, .. } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout => CliError::Timeout { seconds: 0 },

            CoreError::Disconnected => CliError::ConnectionFailed {
                reason: "The session is not open".into(),
            },

            CoreError::Realtime { message } => CliError::Realtime { message },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::PresetNotFound {
                device_id,
                preset_id,
            } => CliError::NotFound {
                resource_type: "preset".into(),
                identifier: preset_id.to_string(),
                list_command: format!("presets list {device_id}"),
            },

            CoreError::NotFound { resource } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: resource,
                list_command: "devices list".into(),
            },

            CoreError::ValidationFailed { message } => match message.split_once(": ") {
                Some((field, reason)) => CliError::Validation {
                    field: field.into(),
                    reason: reason.into(),
                },
                None => CliError::Validation {
                    field: "input".into(),
                    reason: message,
                },
            },

            CoreError::Api {
                message, status, ..
            } => CliError::ApiError { status, message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile, secret } => CliError::NoCredentials {
                profile,
                secret: secret.into(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
