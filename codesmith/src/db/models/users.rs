use crate::{api::models::users::Role, types::UserId};
use chrono::{DateTime, Utc};

/// Database request for provisioning a user from identity provider claims
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

/// Database request for updating a user (admin console)
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_banned: Option<bool>,
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
