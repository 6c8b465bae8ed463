use crate::{db::models::admin_logs::AdminLogDBResponse, types::UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub admin_id: UserId,
    pub action: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub target_user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AdminLogDBResponse> for AdminLogResponse {
    fn from(db: AdminLogDBResponse) -> Self {
        Self {
            id: db.id,
            admin_id: db.admin_id,
            action: db.action,
            target_user_id: db.target_user_id,
            details: db.details,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAdminLogsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}
