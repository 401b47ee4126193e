//! Profile models.
//!
//! A profile row is created when a principal finishes onboarding. Until then the row may be
//! missing entirely, which is the normal state for a brand-new user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a profile record from the database.
///
/// # Database Table
///
/// Maps to the `profile` table. `id` is the principal id issued by the auth provider.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub familiarity: Option<String>,
    pub build_plan: Option<String>,

    /// The single fact route resolution depends on.
    pub onboarding_completed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Onboarding form submission.
///
/// # JSON Example
///
/// ```json
/// {
///   "email": "ada@example.com",
///   "name": "Ada Lovelace",
///   "company": "Analytical Engines",
///   "job_title": "Engineer",
///   "familiarity": "some",
///   "build_plan": "Distributed evaluation jobs"
/// }
/// ```
///
/// Every field is optional; submitting the form is what completes onboarding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardingRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, alias = "full_name")]
    pub name: Option<String>,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default, alias = "jobTitle")]
    pub job_title: Option<String>,

    #[serde(default)]
    pub familiarity: Option<String>,

    #[serde(default, alias = "buildPlan")]
    pub build_plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    /// Where the client should navigate next
    pub redirect: String,
}
