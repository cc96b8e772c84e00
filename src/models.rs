use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Domain Schemas ---

/// Role
///
/// The privilege tier attached to a session. `Free < Premium < Vip` form the paid
/// ladder; `Admin` is the administrative role and is never sold as a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Free,
    Premium,
    Vip,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Free, Role::Premium, Role::Vip, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Free => "free",
            Role::Premium => "premium",
            Role::Vip => "vip",
            Role::Admin => "admin",
        }
    }

    /// Parses the lowercase wire/storage form. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == value)
    }

    /// Position on the paid ladder. `None` for the administrative role, which is
    /// therefore never purchasable.
    pub fn tier(&self) -> Option<u8> {
        match self {
            Role::Free => Some(0),
            Role::Premium => Some(1),
            Role::Vip => Some(2),
            Role::Admin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile
///
/// The user-profile document keyed by the identity provider's subject id.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    // Sessions issued before this instant are rejected by revocation-aware verification.
    pub sessions_valid_after: Option<DateTime<Utc>>,
}

impl Profile {
    /// A fresh `free` profile, as created on first sign-in.
    pub fn new(uid: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            role: Role::Free,
            created_at: now,
            updated_at: now,
            last_login: None,
            sessions_valid_after: None,
        }
    }
}

/// ProfileUpdate
///
/// Partial update applied by `Repository::update_profile`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub last_login: Option<DateTime<Utc>>,
    pub sessions_valid_after: Option<DateTime<Utc>>,
}

// --- Request Payloads (Input Schemas) ---

/// IssueSessionRequest
///
/// Body of `POST /api/auth/login`: the short-lived identity token obtained from a
/// successful sign-in against the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IssueSessionRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// UpdateProfileRequest
///
/// Body of `PUT /api/user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

/// ChangePlanRequest
///
/// Body of `POST /api/subscription`. The plan id is the target role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangePlanRequest {
    pub plan_id: String,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// ErrorResponse
///
/// Every failure body. The message is always generic for upstream failures.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

/// ProfileView
///
/// The client-facing projection of a `Profile`. The revocation watermark stays server side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileView {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    /// Whether premium content is unlocked for this role.
    pub premium_access: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub last_login: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            premium_access: crate::policy::has_premium_access(profile.role),
            uid: profile.uid,
            email: profile.email,
            display_name: profile.display_name,
            role: profile.role,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            last_login: profile.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub user: ProfileView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PlanChangedResponse {
    pub success: bool,
    pub role: Role,
}

/// Plan
///
/// One entry of the subscription catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Plan {
    pub id: Role,
    pub name: String,
    /// Monthly price in euro cents.
    pub monthly_price_cents: u32,
    pub description: String,
    pub features: Vec<String>,
    pub not_included: Vec<String>,
    pub highlight: bool,
}

/// DashboardSummary
///
/// Payload of `GET /dashboard`, built from the gate-verified session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardSummary {
    pub uid: String,
    pub role: Role,
    pub premium_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PremiumContent {
    pub path: String,
    pub unlocked: bool,
}

/// AdminStats
///
/// Output schema for `GET /admin/stats`: profile counts per role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminStats {
    pub total_users: i64,
    pub free: i64,
    pub premium: i64,
    pub vip: i64,
    pub admin: i64,
}
