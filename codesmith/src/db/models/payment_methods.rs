use crate::types::PaymentMethodId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Method-specific configuration, tagged by the kind of payment rail.
///
/// Stored as JSONB; each variant carries its own typed fields instead of an open map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethodConfig {
    /// Offline bank transfer, confirmed by an admin.
    BankTransfer {
        bank_name: String,
        account_name: String,
        account_number: String,
        #[serde(default)]
        instructions: Option<String>,
    },
    /// Mobile wallet send-money to a merchant number, confirmed by an admin.
    MobileWallet {
        provider: String,
        merchant_number: String,
        #[serde(default)]
        instructions: Option<String>,
    },
    /// Card processor that settles synchronously.
    Card { processor: String, merchant_id: String },
}

impl PaymentMethodConfig {
    /// Manual methods need an admin to approve the payment before credits are awarded.
    pub fn is_manual(&self) -> bool {
        match self {
            PaymentMethodConfig::BankTransfer { .. } | PaymentMethodConfig::MobileWallet { .. } => true,
            PaymentMethodConfig::Card { .. } => false,
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        match self {
            PaymentMethodConfig::BankTransfer { instructions, .. } | PaymentMethodConfig::MobileWallet { instructions, .. } => {
                instructions.as_deref()
            }
            PaymentMethodConfig::Card { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentMethodCreateDBRequest {
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub config: PaymentMethodConfig,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentMethodUpdateDBRequest {
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub config: Option<PaymentMethodConfig>,
}

#[derive(Debug, Clone)]
pub struct PaymentMethodDBResponse {
    pub id: PaymentMethodId,
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub config: PaymentMethodConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
