// ── Core error types ──
//
// User-facing errors from anthem-core. The `From<anthem_api::Error>` impl
// translates gateway errors into domain variants while keeping the HTTP
// status, so the CLI can still pick an exit code from it.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Anthem cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        message: String,
        status: Option<u16>,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Session is not open")]
    Disconnected,

    #[error("Realtime channel failed: {message}")]
    Realtime { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Preset {preset_id} not found on device {device_id}")]
    PresetNotFound { device_id: String, preset_id: u32 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// HTTP status code behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed { status, .. } | Self::Api { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

// ── Conversion from gateway errors ───────────────────────────────────

impl From<anthem_api::Error> for CoreError {
    fn from(err: anthem_api::Error) -> Self {
        use anthem_api::Error as ApiError;

        match err {
            ApiError::Authentication {
                message, status, ..
            } => CoreError::AuthenticationFailed { message, status },
            ApiError::NotFound { endpoint, .. } => CoreError::NotFound { resource: endpoint },
            ApiError::Validation { field, message } => CoreError::ValidationFailed {
                message: format!("{field}: {message}"),
            },
            ApiError::Api {
                source: Some(ref e),
                ..
            } if e.is_timeout() => CoreError::Timeout,
            ApiError::Api {
                message,
                status: None,
                ..
            } => CoreError::ConnectionFailed { reason: message },
            ApiError::Api {
                message,
                status,
                body,
                ..
            } => CoreError::Api {
                message,
                status,
                body,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn authentication_keeps_status() {
        let err: CoreError = anthem_api::Error::Authentication {
            message: "Invalid credentials".into(),
            status: Some(401),
            body: None,
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Authentication failed: Invalid credentials");
    }

    #[test]
    fn missing_response_is_a_connection_failure() {
        let err: CoreError = anthem_api::Error::Api {
            message: "dns error".into(),
            status: None,
            body: None,
            source: None,
        }
        .into();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }

    #[test]
    fn http_failures_stay_api_errors() {
        let err: CoreError = anthem_api::Error::Api {
            message: "boom".into(),
            status: Some(503),
            body: Some("busy".into()),
            source: None,
        }
        .into();
        assert_eq!(err.status(), Some(503));

        let err: CoreError = anthem_api::Error::NotFound {
            endpoint: "/x".into(),
            status: 404,
            body: None,
        }
        .into();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn validation_names_the_field() {
        let err: CoreError = anthem_api::Error::Validation {
            field: "temperature",
            message: "60 is above the maximum of 49°C".into(),
        }
        .into();
        assert!(err.to_string().contains("temperature: 60"));
    }
}
