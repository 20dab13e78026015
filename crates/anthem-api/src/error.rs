use thiserror::Error;

/// Raw bodies are clipped to this many characters in error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// Top-level error type for the `anthem-api` crate.
///
/// Four families: the identity provider rejected us, the API reported a
/// missing resource, the API (or the network in between) failed, or the
/// caller handed us a value the protocol cannot carry. HTTP-derived
/// variants keep the status code and the raw response body so callers can
/// log exactly what the cloud said. `anthem-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token request rejected, malformed token response, or the token
    /// endpoint was unreachable.
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    // ── API ─────────────────────────────────────────────────────────
    /// The API answered 404 for the requested resource.
    #[error("Resource not found: {endpoint}")]
    NotFound {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },

    /// Any other API failure. `status` is `None` when no HTTP response was
    /// received at all (DNS, TLS, connection reset, timeout).
    #[error("API request failed{}: {message}", status_suffix(.status))]
    Api {
        message: String,
        status: Option<u16>,
        body: Option<String>,
        #[source]
        source: Option<reqwest::Error>,
    },

    // ── Validation ──────────────────────────────────────────────────
    /// A caller-supplied value is outside what the protocol can express.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Wrap a transport-level failure (no HTTP response was produced).
    pub(crate) fn transport(context: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("{context}: request timed out")
        } else {
            format!("{context}: {err}")
        };
        Self::Api {
            message,
            status: None,
            body: None,
            source: Some(err),
        }
    }

    /// HTTP status code attached to this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => *status,
            Self::NotFound { status, .. } => Some(*status),
            Self::Validation { .. } => None,
        }
    }

    /// The unmodified response body, if the server sent one.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Authentication { body, .. }
            | Self::NotFound { body, .. }
            | Self::Api { body, .. } => body.as_deref(),
            Self::Validation { .. } => None,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api {
                source: Some(e), ..
            } => e.is_timeout() || e.is_connect(),
            Self::Api {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Shorten a response body for inclusion in an error message.
pub(crate) fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
        trimmed.to_owned()
    } else {
        let cut: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}
