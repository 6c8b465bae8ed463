use crate::{
    db::{
        errors::Result,
        models::admin_logs::{AdminLogCreateDBRequest, AdminLogDBResponse},
    },
    types::UserId,
};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgConnection};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct AdminLog {
    id: Uuid,
    admin_id: UserId,
    action: String,
    target_user_id: Option<UserId>,
    details: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<AdminLog> for AdminLogDBResponse {
    fn from(log: AdminLog) -> Self {
        Self {
            id: log.id,
            admin_id: log.admin_id,
            action: log.action,
            target_user_id: log.target_user_id,
            details: log.details.0,
            created_at: log.created_at,
        }
    }
}

/// Audit trail of admin actions. Written in the same transaction as the action it describes.
pub struct AdminLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AdminLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &AdminLogCreateDBRequest) -> Result<AdminLogDBResponse> {
        let log = sqlx::query_as::<_, AdminLog>(
            r#"
            INSERT INTO admin_logs (admin_id, action, target_user_id, details)
            VALUES ($1, $2, $3, $4)
            RETURNING id, admin_id, action, target_user_id, details, created_at
            "#,
        )
        .bind(request.admin_id)
        .bind(&request.action)
        .bind(request.target_user_id)
        .bind(Json(&request.details))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(AdminLogDBResponse::from(log))
    }

    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<AdminLogDBResponse>> {
        let logs = sqlx::query_as::<_, AdminLog>(
            r#"
            SELECT id, admin_id, action, target_user_id, details, created_at
            FROM admin_logs
            ORDER BY created_at DESC, id DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs.into_iter().map(AdminLogDBResponse::from).collect())
    }
}
