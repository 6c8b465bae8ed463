use crate::types::{CreditTransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Credit transaction type enum matching the database enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "credit_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    Purchase,
    Usage,
    Bonus,
    Refund,
    AdminAdjustment,
}

impl CreditTransactionType {
    /// Whether a signed amount is allowed for this type (mirrors the ledger CHECK constraint).
    pub fn accepts(self, amount: i64) -> bool {
        match self {
            CreditTransactionType::Purchase | CreditTransactionType::Bonus | CreditTransactionType::Refund => amount > 0,
            CreditTransactionType::Usage => amount < 0,
            CreditTransactionType::AdminAdjustment => amount != 0,
        }
    }
}

/// Database request for creating a new credit transaction
///
/// `amount` is signed: positive credits the balance, negative debits it.
#[derive(Debug, Clone)]
pub struct CreditTransactionCreateDBRequest {
    pub user_id: UserId,
    pub transaction_type: CreditTransactionType,
    pub amount: i64,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
}

impl CreditTransactionCreateDBRequest {
    pub fn new(user_id: UserId, transaction_type: CreditTransactionType, amount: i64) -> Self {
        Self {
            user_id,
            transaction_type,
            amount,
            description: None,
            reference_id: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

/// Database response for a credit transaction
#[derive(Debug, Clone)]
pub struct CreditTransactionDBResponse {
    pub id: CreditTransactionId,
    pub user_id: UserId,
    pub transaction_type: CreditTransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Current balance row for a user
#[derive(Debug, Clone)]
pub struct CreditBalanceDBResponse {
    pub user_id: UserId,
    pub amount: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_sign_rules() {
        assert!(CreditTransactionType::Purchase.accepts(10));
        assert!(!CreditTransactionType::Purchase.accepts(-10));
        assert!(CreditTransactionType::Bonus.accepts(50));
        assert!(!CreditTransactionType::Refund.accepts(0));
        assert!(CreditTransactionType::Usage.accepts(-1));
        assert!(!CreditTransactionType::Usage.accepts(1));
        assert!(CreditTransactionType::AdminAdjustment.accepts(-5));
        assert!(CreditTransactionType::AdminAdjustment.accepts(5));
        assert!(!CreditTransactionType::AdminAdjustment.accepts(0));
    }
}
