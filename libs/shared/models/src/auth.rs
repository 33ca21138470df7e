use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Admin,
    Provider,
    Requester,
}

impl User {
    pub fn uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }

    /// Role claim as a closed variant; unknown or missing roles get no role.
    pub fn caller_role(&self) -> Option<CallerRole> {
        match self.role.as_deref()? {
            "admin" => Some(CallerRole::Admin),
            "provider" => Some(CallerRole::Provider),
            "requester" => Some(CallerRole::Requester),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.caller_role() == Some(CallerRole::Admin)
    }
}
