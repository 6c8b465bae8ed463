use crate::{
    db::models::payment_methods::{PaymentMethodConfig, PaymentMethodDBResponse},
    types::PaymentMethodId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodCreate {
    /// Unique machine name, e.g. `bank_transfer`
    pub name: String,
    pub display_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub config: PaymentMethodConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodUpdate {
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub config: Option<PaymentMethodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentMethodId,
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    /// Manual methods need admin approval before credits are awarded
    pub manual: bool,
    pub config: PaymentMethodConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentMethodDBResponse> for PaymentMethodResponse {
    fn from(db: PaymentMethodDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            display_name: db.display_name,
            enabled: db.enabled,
            manual: db.config.is_manual(),
            config: db.config,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPaymentMethodsQuery {
    /// Include disabled methods (admin only)
    pub include_disabled: Option<bool>,
}
