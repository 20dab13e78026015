// Azure AD B2C token lifecycle
//
// Resource-owner password grant against the B2C token endpoint, refresh
// with the issued refresh token, and a five-minute renewal margin. One
// `TokenManager` owns at most one credential; renewal is serialized by an
// async mutex so concurrent callers share a single token request.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::error::Error;
use crate::lenient::Fields;
use crate::transport::TransportConfig;

/// A credential is renewed once fewer than this many seconds remain.
pub const SAFETY_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on a server-declared lifetime (one year).
const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

// ── Credential ──────────────────────────────────────────────────────

/// An access token plus everything needed to renew it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: DateTime<Utc>,
    pub id_token: Option<SecretString>,
}

impl Credential {
    /// `true` while at least [`SAFETY_MARGIN_SECS`] of lifetime remain at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        (self.expires_at - now).num_seconds() >= SAFETY_MARGIN_SECS
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Account id carried in the access token (`oid`, else `sub`).
    ///
    /// The signature is not verified; the claim is only used to address
    /// the customer endpoints the same token is presented to.
    pub fn subject(&self) -> Option<String> {
        let payload = self.access_token.expose_secret().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Value = serde_json::from_slice(&bytes).ok()?;
        let f = Fields::new(&claims);
        f.opt_string("oid")
            .or_else(|| f.opt_string("sub"))
            .filter(|s| !s.is_empty())
    }
}

/// Where a token manager stands relative to the renewal margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TokenState {
    Unauthenticated,
    Valid,
    NearExpiry,
}

// ── Token manager ───────────────────────────────────────────────────

/// Owns the B2C credential for one account.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    config: AuthConfig,
    token_url: Url,
    credential: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(config: AuthConfig, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(config, http)
    }

    /// Use an existing `reqwest::Client` for token requests.
    pub fn with_client(config: AuthConfig, http: reqwest::Client) -> Result<Self, Error> {
        let token_url = config.token_url()?;
        Ok(Self {
            http,
            config,
            token_url,
            credential: Mutex::new(None),
        })
    }

    /// Password grant. Replaces any held credential on success.
    pub async fn authenticate(&self) -> Result<Credential, Error> {
        let mut held = self.credential.lock().await;
        let credential = self.password_grant().await?;
        *held = Some(credential.clone());
        Ok(credential)
    }

    /// Refresh-token grant, falling back to [`authenticate`](Self::authenticate)
    /// if the identity provider rejects the refresh token.
    pub async fn refresh(&self) -> Result<Credential, Error> {
        let mut held = self.credential.lock().await;
        self.refresh_locked(&mut held).await
    }

    /// Return a credential with at least [`SAFETY_MARGIN_SECS`] remaining,
    /// authenticating or refreshing as needed.
    pub async fn ensure_valid(&self) -> Result<Credential, Error> {
        let mut held = self.credential.lock().await;
        match held.as_ref() {
            Some(credential) if credential.is_valid() => Ok(credential.clone()),
            Some(credential) if credential.refresh_token.is_some() => {
                debug!(expires_at = %credential.expires_at, "credential near expiry, refreshing");
                self.refresh_locked(&mut held).await
            }
            _ => {
                let credential = self.password_grant().await?;
                *held = Some(credential.clone());
                Ok(credential)
            }
        }
    }

    /// Forget the held credential. The next `ensure_valid` authenticates.
    pub async fn clear(&self) {
        *self.credential.lock().await = None;
    }

    pub async fn state(&self) -> TokenState {
        match self.credential.lock().await.as_ref() {
            None => TokenState::Unauthenticated,
            Some(c) if c.is_valid() => TokenState::Valid,
            Some(_) => TokenState::NearExpiry,
        }
    }

    /// Snapshot of the held credential, without renewing it.
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    // ── Grants ──────────────────────────────────────────────────────

    async fn refresh_locked(&self, held: &mut Option<Credential>) -> Result<Credential, Error> {
        let refresh_token = held
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .ok_or_else(|| Error::Authentication {
                message: "no refresh token held, authenticate first".into(),
                status: None,
                body: None,
            })?;

        let scope = self.config.scope();
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
            ("scope", scope.as_str()),
        ];

        debug!("POST {} (refresh_token grant)", self.token_url);
        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("token refresh failed: {e}"),
                status: None,
                body: None,
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        let credential = if status.is_success() {
            parse_token_response(status.as_u16(), &body)?
        } else {
            warn!(
                status = status.as_u16(),
                "refresh token rejected, re-authenticating"
            );
            self.password_grant().await?
        };

        *held = Some(credential.clone());
        Ok(credential)
    }

    async fn password_grant(&self) -> Result<Credential, Error> {
        let scope = self.config.scope();
        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.expose_secret()),
            ("scope", scope.as_str()),
        ];

        debug!("POST {} (password grant)", self.token_url);
        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("token endpoint unreachable: {e}"),
                status: None,
                body: None,
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Authentication {
                message: error_description(&body),
                status: Some(status.as_u16()),
                body: Some(body),
            });
        }

        let credential = parse_token_response(status.as_u16(), &body)?;
        debug!(expires_at = %credential.expires_at, "authenticated");
        Ok(credential)
    }
}

// ── Token response ──────────────────────────────────────────────────

/// `error_description` from a B2C error body, or a generic message.
fn error_description(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| Fields::new(&v).opt_string("error_description"))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "Unknown error".into())
}

fn parse_token_response(status: u16, body: &str) -> Result<Credential, Error> {
    parse_token_response_at(status, body, Utc::now())
}

fn parse_token_response_at(
    status: u16,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Credential, Error> {
    let malformed = |message: &str| Error::Authentication {
        message: message.into(),
        status: Some(status),
        body: Some(body.to_owned()),
    };

    let value: Value =
        serde_json::from_str(body).map_err(|_| malformed("token response is not JSON"))?;
    let f = Fields::new(&value);

    let access_token = f
        .opt_string("access_token")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("token response has no access_token"))?;

    let lifetime = f
        .i64_or("expires_in", DEFAULT_EXPIRES_IN_SECS)
        .clamp(0, MAX_EXPIRES_IN_SECS);

    Ok(Credential {
        access_token: access_token.into(),
        refresh_token: f
            .opt_string("refresh_token")
            .filter(|t| !t.is_empty())
            .map(SecretString::from),
        expires_at: now + TimeDelta::try_seconds(lifetime).unwrap_or(TimeDelta::zero()),
        id_token: f
            .opt_string("id_token")
            .filter(|t| !t.is_empty())
            .map(SecretString::from),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "a.b.c".to_string().into(),
            refresh_token: None,
            expires_at,
            id_token: None,
        }
    }

    fn jwt(claims: &str) -> String {
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(claims))
    }

    #[test]
    fn validity_boundary_is_inclusive() {
        let now = Utc::now();
        let margin = TimeDelta::seconds(SAFETY_MARGIN_SECS);
        assert!(credential(now + margin).is_valid_at(now));
        assert!(!credential(now + margin - TimeDelta::seconds(1)).is_valid_at(now));
        assert!(!credential(now - TimeDelta::hours(1)).is_valid_at(now));
        assert!(credential(now + TimeDelta::hours(1)).is_valid_at(now));
    }

    #[test]
    fn subject_prefers_oid() {
        let mut c = credential(Utc::now());
        c.access_token = jwt(r#"{"sub":"s-1","oid":"o-1"}"#).into();
        assert_eq!(c.subject().as_deref(), Some("o-1"));

        c.access_token = jwt(r#"{"sub":"s-1"}"#).into();
        assert_eq!(c.subject().as_deref(), Some("s-1"));

        c.access_token = "opaque".to_string().into();
        assert_eq!(c.subject(), None);
    }

    #[test]
    fn token_response_accepts_string_lifetime() {
        let now = Utc::now();
        let c = parse_token_response_at(
            200,
            r#"{"access_token":"t","refresh_token":"r","expires_in":"120"}"#,
            now,
        )
        .unwrap();
        assert_eq!(c.expires_at, now + TimeDelta::seconds(120));
        assert_eq!(c.refresh_token.unwrap().expose_secret(), "r");
        assert!(c.id_token.is_none());
    }

    #[test]
    fn token_response_defaults() {
        let now = Utc::now();
        let c = parse_token_response_at(200, r#"{"access_token":"t","refresh_token":""}"#, now)
            .unwrap();
        assert_eq!(c.expires_at, now + TimeDelta::seconds(3600));
        assert!(c.refresh_token.is_none());
    }

    #[test]
    fn token_response_without_access_token_fails() {
        let err = parse_token_response_at(200, r#"{"token_type":"Bearer"}"#, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Authentication { status: Some(200), .. }));
        assert!(parse_token_response_at(200, "<html>", Utc::now()).is_err());
    }

    #[test]
    fn error_description_falls_back() {
        assert_eq!(
            error_description(r#"{"error":"invalid_grant","error_description":"Invalid credentials"}"#),
            "Invalid credentials"
        );
        assert_eq!(error_description("oops"), "Unknown error");
    }
}
