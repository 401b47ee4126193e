//! Session, principal and routing types.
//!
//! None of these are persisted. A [`SessionValidity`] and a [`RouteDecision`] are recomputed
//! on every check because the underlying session and profile can change between visits.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cookie carrying the encoded [`Session`].
pub const SESSION_COOKIE_NAME: &str = "ray_session";

/// Cookie carrying the PKCE verifier between sign-in and callback.
pub const CODE_VERIFIER_COOKIE_NAME: &str = "ray_code_verifier";

/// Session issued by the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Unix timestamp (seconds) after which the access token is no longer accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// A session cookie that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum SessionCookieError {
    #[error("session cookie is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("session cookie payload is not a session: {0}")]
    Payload(#[from] serde_json::Error),
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now().timestamp())
    }

    /// Encode for storage in [`SESSION_COOKIE_NAME`].
    pub fn to_cookie_value(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn from_cookie_value(value: &str) -> Result<Self, SessionCookieError> {
        let bytes = URL_SAFE_NO_PAD.decode(value.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The authenticated user on whose behalf actions are taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,

    #[serde(default)]
    pub email: Option<String>,
}

/// Why a session was judged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionReason {
    /// The provider could not read the stored session
    SessionCorrupted,
    /// Normal signed-out state
    NoSession,
    /// The session outlived the account
    UserNotFound,
    /// The provider rejected the session for another reason
    AuthError,
    /// The provider could not be reached while checking
    ValidationFailed,
}

impl SessionReason {
    /// Every reason except a plain missing session forces a sign-out to purge the stale session.
    pub fn requires_sign_out(self) -> bool {
        !matches!(self, SessionReason::NoSession)
    }

    pub fn message(self) -> &'static str {
        match self {
            SessionReason::SessionCorrupted => "Session corrupted",
            SessionReason::NoSession => "No session found",
            SessionReason::UserNotFound => "User no longer exists",
            SessionReason::AuthError => "Authentication error",
            SessionReason::ValidationFailed => "Session validation failed",
        }
    }
}

/// Verdict of a session check.
///
/// # JSON Example
///
/// ```json
/// { "is_valid": false, "should_sign_out": true, "reason": "user_not_found" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionValidity {
    pub is_valid: bool,
    pub should_sign_out: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SessionReason>,

    /// Resolved principal for a valid session, so callers do not fetch it twice.
    #[serde(skip)]
    pub principal: Option<Principal>,
}

impl SessionValidity {
    pub fn valid(principal: Principal) -> Self {
        Self {
            is_valid: true,
            should_sign_out: false,
            reason: None,
            principal: Some(principal),
        }
    }

    pub fn invalid(reason: SessionReason) -> Self {
        Self {
            is_valid: false,
            should_sign_out: reason.requires_sign_out(),
            reason: Some(reason),
            principal: None,
        }
    }
}

/// Where an authenticated principal lands next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteDecision {
    #[serde(rename = "onboarding")]
    GoToOnboarding,
    #[serde(rename = "dashboard")]
    GoToDashboard,
}

impl RouteDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteDecision::GoToOnboarding => "onboarding",
            RouteDecision::GoToDashboard => "dashboard",
        }
    }

    /// Path the browser is sent to.
    pub fn path(self) -> &'static str {
        match self {
            RouteDecision::GoToOnboarding => "/onboarding",
            RouteDecision::GoToDashboard => "/keys",
        }
    }
}

/// Body of `GET /api/v1/session`.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    #[serde(flatten)]
    pub validity: SessionValidity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteDecision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_survives_encoding() {
        let session = Session {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(1_900_000_000),
        };

        let decoded = Session::from_cookie_value(&session.to_cookie_value()).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn garbage_cookie_is_rejected() {
        assert!(matches!(
            Session::from_cookie_value("not base64 !!"),
            Err(SessionCookieError::Encoding(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            Session::from_cookie_value(&not_json),
            Err(SessionCookieError::Payload(_))
        ));
    }

    #[test]
    fn only_missing_session_skips_sign_out() {
        assert!(!SessionValidity::invalid(SessionReason::NoSession).should_sign_out);
        for reason in [
            SessionReason::SessionCorrupted,
            SessionReason::UserNotFound,
            SessionReason::AuthError,
            SessionReason::ValidationFailed,
        ] {
            assert!(SessionValidity::invalid(reason).should_sign_out, "{reason:?}");
        }
    }

    #[test]
    fn route_decision_serializes_as_short_name() {
        assert_eq!(
            serde_json::to_value(RouteDecision::GoToDashboard).unwrap(),
            serde_json::json!("dashboard")
        );
        assert_eq!(RouteDecision::GoToOnboarding.path(), "/onboarding");

        for route in [RouteDecision::GoToOnboarding, RouteDecision::GoToDashboard] {
            assert_eq!(serde_json::to_value(route).unwrap(), route.as_str());
        }
    }
}
