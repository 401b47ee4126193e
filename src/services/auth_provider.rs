//! Client for the hosted auth provider.
//!
//! [`HostedAuthClient`] is shared across requests. [`HostedAuthClient::bind`] pairs it with one
//! request's cookies to produce a [`SessionProvider`].
//!
//! # Endpoints Used
//!
//! - `GET  /auth/v1/user` - principal behind an access token
//! - `POST /auth/v1/token?grant_type=pkce` - exchange an OAuth code for a session
//! - `POST /auth/v1/logout` - revoke a session
//! - `/auth/v1/authorize` - where the browser is sent to start OAuth

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use super::session_service::{ProviderError, SessionProvider};
use crate::models::session::{Principal, Session};

/// Error code the provider returns when a session outlived its user.
const USER_NOT_FOUND_CODE: &str = "user_not_found";

/// Shared HTTP client for the provider.
#[derive(Debug, Clone)]
pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

/// Provider bound to the session stored in one request's cookies.
pub struct RequestAuth<'a> {
    client: &'a HostedAuthClient,
    session_cookie: Option<String>,
    code_verifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl HostedAuthClient {
    /// Build a client whose every call is bounded by `request_timeout`.
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::Malformed(format!("invalid auth URL: {e}")))?;

        // Endpoints are joined relative to the base, which needs a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("HTTP client error: {e}")))?;

        Ok(Self {
            http,
            base_url,
            anon_key: anon_key.into(),
        })
    }

    /// Bind to the cookies of an incoming request.
    pub fn bind(
        &self,
        session_cookie: Option<String>,
        code_verifier: Option<String>,
    ) -> RequestAuth<'_> {
        RequestAuth {
            client: self,
            session_cookie,
            code_verifier,
        }
    }

    /// Bind to a session that has not been written to a cookie yet.
    pub fn with_session(&self, session: &Session) -> RequestAuth<'_> {
        self.bind(Some(session.to_cookie_value()), None)
    }

    /// URL that starts the OAuth flow for `provider`, returning to `redirect_to`.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Malformed(format!("invalid auth endpoint: {e}")))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Principal, ProviderError> {
        let response = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("unexpected user payload: {e}")))?;

        Ok(Principal {
            id: user.id,
            email: user.email,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, ProviderError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "auth_code": code,
                "code_verifier": code_verifier,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("unexpected token payload: {e}")))?;

        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|seconds| Utc::now().timestamp() + seconds)
        });

        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
        })
    }

    async fn logout(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        // Already revoked is as good as revoked
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        Err(rejection(response).await)
    }
}

impl RequestAuth<'_> {
    fn stored_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(value) = self.session_cookie.as_deref() else {
            return Ok(None);
        };

        let session = Session::from_cookie_value(value)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if session.is_expired() {
            return Ok(None);
        }

        Ok(Some(session))
    }

    fn require_session(&self) -> Result<Session, ProviderError> {
        self.stored_session()?.ok_or_else(|| ProviderError::Rejected {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            message: "no session".to_string(),
        })
    }
}

#[async_trait]
impl<'a> SessionProvider for RequestAuth<'a> {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.stored_session()
    }

    async fn get_principal(&self) -> Result<Principal, ProviderError> {
        let session = self.require_session()?;
        self.client.fetch_user(&session.access_token).await
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ProviderError> {
        self.client
            .exchange_code(code, self.code_verifier.as_deref())
            .await
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        match self.stored_session() {
            Ok(Some(session)) => self.client.logout(&session.access_token).await,
            // Nothing usable to revoke; clearing the cookie is all that is left
            Ok(None) | Err(_) => Ok(()),
        }
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(err.to_string())
}

/// Classify a non-2xx provider response.
async fn rejection(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body: ErrorResponse = response.json().await.unwrap_or_default();

    if status == StatusCode::NOT_FOUND || body.error_code.as_deref() == Some(USER_NOT_FOUND_CODE) {
        return ProviderError::NotFound;
    }

    if status.is_server_error() {
        return ProviderError::Unavailable(format!("provider returned {status}"));
    }

    ProviderError::Rejected {
        status: status.as_u16(),
        message: body
            .msg
            .or(body.error_description)
            .unwrap_or_else(|| status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HostedAuthClient {
        HostedAuthClient::new("https://auth.example.com/", "anon", Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn missing_cookie_means_no_session() {
        let client = client();
        let auth = client.bind(None, None);

        assert_eq!(auth.get_session().await, Ok(None));
    }

    #[tokio::test]
    async fn undecodable_cookie_is_malformed() {
        let client = client();
        let auth = client.bind(Some("%%%".to_string()), None);

        assert!(matches!(
            auth.get_session().await,
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn expired_session_counts_as_signed_out() {
        let client = client();
        let expired = Session {
            access_token: "old".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() - 60),
        };

        assert_eq!(client.with_session(&expired).get_session().await, Ok(None));
    }

    #[tokio::test]
    async fn live_session_is_returned() {
        let client = client();
        let live = Session {
            access_token: "fresh".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: Some(Utc::now().timestamp() + 3600),
        };

        assert_eq!(
            client.with_session(&live).get_session().await,
            Ok(Some(live))
        );
    }

    #[tokio::test]
    async fn sign_out_without_session_is_a_no_op() {
        let client = client();
        assert_eq!(client.bind(None, None).sign_out().await, Ok(()));
    }

    #[test]
    fn authorize_url_carries_provider_and_redirect() {
        let url = client()
            .authorize_url("google", "https://app.example.com/auth/callback")
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".to_string(), "google".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "https://app.example.com/auth/callback".to_string()
        )));
    }

    #[test]
    fn base_url_path_is_kept_when_joining() {
        let client =
            HostedAuthClient::new("https://example.com/identity", "anon", Duration::from_secs(1))
                .unwrap();
        let url = client.authorize_url("github", "/cb").unwrap();

        assert_eq!(url.path(), "/identity/auth/v1/authorize");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HostedAuthClient::new("not a url", "anon", Duration::from_secs(1)).is_err());
    }
}
