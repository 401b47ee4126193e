//! Onboarding form handler.

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        profile::{OnboardingRequest, OnboardingResponse},
        session::RouteDecision,
    },
    state::AppState,
};

/// Save the onboarding form and mark onboarding complete.
///
/// # Endpoint
///
/// `POST /api/v1/onboarding`
///
/// # Authentication
///
/// Requires a valid session cookie.
///
/// # Response (200 OK)
///
/// ```json
/// { "redirect": "/keys" }
/// ```
///
/// Creates the profile if the principal has none yet. Email falls back to the one on the
/// session when the form leaves it out.
pub async fn complete_onboarding(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut form): Json<OnboardingRequest>,
) -> Result<Json<OnboardingResponse>, AppError> {
    if form.email.as_deref().is_none_or(str::is_empty) {
        form.email = auth.email;
    }

    let profile = state
        .profiles
        .complete_onboarding(auth.principal_id, &form)
        .await
        .map_err(|source| AppError::Persistence {
            action: "Saving your profile",
            source,
        })?;

    tracing::info!(principal_id = %profile.id, "onboarding completed");

    Ok(Json(OnboardingResponse {
        redirect: RouteDecision::GoToDashboard.path().to_string(),
    }))
}
