// Shared transport configuration for building reqwest::Client instances.
//
// The token manager and the request gateway talk to different hosts but
// share timeout, TLS roots, and user agent through this module.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::error::Error;

const USER_AGENT: &str = concat!("anthem/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on a single request, connect through body.
    pub timeout: Duration,
    /// Extra PEM root certificate (corporate TLS interception, test proxies).
    pub ca_cert: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ca_cert: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.build_client_with_headers(HeaderMap::new())
    }

    /// Build a `reqwest::Client` with additional default headers.
    ///
    /// Used by the gateway to inject the subscription key on every request.
    pub fn build_client_with_headers(&self, headers: HeaderMap) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if let Some(ref path) = self.ca_cert {
            let pem = std::fs::read(path).map_err(|e| Error::Validation {
                field: "ca_cert",
                message: format!("failed to read {}: {e}", path.display()),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| Error::Validation {
                field: "ca_cert",
                message: format!("invalid PEM certificate: {e}"),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        builder.build().map_err(|e| Error::Api {
            message: format!("failed to build HTTP client: {e}"),
            status: None,
            body: None,
            source: Some(e),
        })
    }
}
