use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::payment_methods::{PaymentMethodConfig, PaymentMethodCreateDBRequest, PaymentMethodDBResponse, PaymentMethodUpdateDBRequest},
    },
    types::PaymentMethodId,
};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgConnection};

#[derive(Debug, Clone, Default)]
pub struct PaymentMethodFilter {
    /// Only return methods users may currently pay with
    pub enabled_only: bool,
}

impl PaymentMethodFilter {
    pub fn enabled_only() -> Self {
        Self { enabled_only: true }
    }
}

#[derive(Debug, Clone, FromRow)]
struct PaymentMethod {
    id: PaymentMethodId,
    name: String,
    display_name: String,
    enabled: bool,
    config: Json<PaymentMethodConfig>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentMethod> for PaymentMethodDBResponse {
    fn from(method: PaymentMethod) -> Self {
        Self {
            id: method.id,
            name: method.name,
            display_name: method.display_name,
            enabled: method.enabled,
            config: method.config.0,
            created_at: method.created_at,
            updated_at: method.updated_at,
        }
    }
}

const METHOD_COLUMNS: &str = "id, name, display_name, enabled, config, created_at, updated_at";

pub struct PaymentMethods<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PaymentMethods<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<PaymentMethodDBResponse>> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!("SELECT {METHOD_COLUMNS} FROM payment_methods WHERE name = $1"))
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(method.map(PaymentMethodDBResponse::from))
    }
}

#[async_trait::async_trait]
impl<'c> Repository for PaymentMethods<'c> {
    type CreateRequest = PaymentMethodCreateDBRequest;
    type UpdateRequest = PaymentMethodUpdateDBRequest;
    type Response = PaymentMethodDBResponse;
    type Id = PaymentMethodId;
    type Filter = PaymentMethodFilter;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            r#"
            INSERT INTO payment_methods (name, display_name, enabled, config)
            VALUES ($1, $2, $3, $4)
            RETURNING {METHOD_COLUMNS}
            "#
        ))
        .bind(&request.name)
        .bind(&request.display_name)
        .bind(request.enabled)
        .bind(Json(&request.config))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(PaymentMethodDBResponse::from(method))
    }

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!("SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(method.map(PaymentMethodDBResponse::from))
    }

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE ($1 = false OR enabled) ORDER BY name"
        ))
        .bind(filter.enabled_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(methods.into_iter().map(PaymentMethodDBResponse::from).collect())
    }

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            r#"
            UPDATE payment_methods SET
                display_name = COALESCE($2, display_name),
                enabled = COALESCE($3, enabled),
                config = COALESCE($4, config),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {METHOD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.display_name)
        .bind(request.enabled)
        .bind(request.config.as_ref().map(Json))
        .fetch_optional(&mut *self.db)
        .await?;

        method.map(PaymentMethodDBResponse::from).ok_or(DbError::NotFound)
    }
}
