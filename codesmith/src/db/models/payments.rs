use crate::types::{PaymentMethodId, PaymentTransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a payment transaction.
///
/// Manual payments start `Pending` and are decided by an admin; automated payments go
/// `Processing` -> `Completed` within the submitting request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Approved | PaymentStatus::Rejected)
    }

    /// Allowed transitions. Terminal states have no outgoing edges.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Approved)
                | (PaymentStatus::Pending, PaymentStatus::Rejected)
                | (PaymentStatus::Processing, PaymentStatus::Completed)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub user_id: UserId,
    pub payment_method_id: PaymentMethodId,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub proof_reference: Option<String>,
}

/// Final decision applied to a pending payment
#[derive(Debug, Clone)]
pub struct PaymentReviewDBRequest {
    pub status: PaymentStatus,
    pub admin_notes: Option<String>,
    pub credits_awarded: i64,
    pub reviewed_by: UserId,
}

#[derive(Debug, Clone)]
pub struct PaymentDBResponse {
    pub id: PaymentTransactionId,
    pub user_id: UserId,
    pub payment_method_id: PaymentMethodId,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub proof_reference: Option<String>,
    pub admin_notes: Option<String>,
    pub credits_awarded: i64,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
