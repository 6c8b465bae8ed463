use crate::types::UserId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Database request for an admin audit entry
#[derive(Debug, Clone)]
pub struct AdminLogCreateDBRequest {
    pub admin_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AdminLogDBResponse {
    pub id: Uuid,
    pub admin_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
