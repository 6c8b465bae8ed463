use crate::{db::errors::Result, types::UserId};
use sqlx::PgConnection;

/// Key under which the encrypted completion API key is stored
pub const COMPLETION_API_KEY: &str = "completion_api_key";

/// Key/value runtime settings editable from the admin console
pub struct Settings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(value)
    }

    pub async fn set(&mut self, key: &str, value: &str, updated_by: UserId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_by = EXCLUDED.updated_by, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Set a one-shot boolean flag in `system_config`, returning whether it was previously unset
    pub async fn claim_flag(&mut self, key: &str) -> Result<bool> {
        let claimed = sqlx::query("UPDATE system_config SET value = true, updated_at = NOW() WHERE key = $1 AND value = false")
            .bind(key)
            .execute(&mut *self.db)
            .await?
            .rows_affected();

        Ok(claimed > 0)
    }
}
