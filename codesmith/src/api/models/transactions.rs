use crate::{
    db::models::credits::{CreditTransactionDBResponse, CreditTransactionType},
    types::{CreditTransactionId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// Subset of the ledger entry types an admin may create by hand
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    AdminAdjustment,
    Refund,
}

impl From<TransactionType> for CreditTransactionType {
    fn from(tx_type: TransactionType) -> Self {
        match tx_type {
            TransactionType::AdminAdjustment => CreditTransactionType::AdminAdjustment,
            TransactionType::Refund => CreditTransactionType::Refund,
        }
    }
}

// Request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditTransactionCreate {
    /// User ID (required - UUID format)
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// Type of transaction (only admin_adjustment and refund are allowed)
    pub transaction_type: TransactionType,
    /// Signed credit amount; refunds must be positive, adjustments non-zero
    pub amount: i64,
    /// Optional description of the transaction
    pub description: Option<String>,
}

// Response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditTransactionResponse {
    /// Transaction ID
    #[schema(value_type = String, format = "uuid")]
    pub id: CreditTransactionId,
    /// User ID
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// Transaction type
    pub transaction_type: CreditTransactionType,
    /// Signed amount of credits
    pub amount: i64,
    /// Balance after this transaction
    pub balance_after: i64,
    /// Description
    pub description: Option<String>,
    /// Generation or payment this entry belongs to
    #[schema(value_type = Option<String>, format = "uuid")]
    pub reference_id: Option<Uuid>,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTransactionsQuery {
    /// Filter by user ID (optional, admin only for other users)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,

    /// Number of items to skip
    pub skip: Option<i64>,

    /// Maximum number of items to return
    pub limit: Option<i64>,
}

// Conversions
impl From<CreditTransactionDBResponse> for CreditTransactionResponse {
    fn from(db: CreditTransactionDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            transaction_type: db.transaction_type,
            amount: db.amount,
            balance_after: db.balance_after,
            description: db.description,
            reference_id: db.reference_id,
            created_at: db.created_at,
        }
    }
}
