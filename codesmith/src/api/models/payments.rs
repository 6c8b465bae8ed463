use crate::{
    billing::payments::{PaymentReceipt, ReviewDecision},
    db::models::payments::{PaymentDBResponse, PaymentStatus},
    types::{PaymentMethodId, PaymentTransactionId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCreate {
    #[schema(value_type = String, format = "uuid")]
    pub payment_method_id: PaymentMethodId,
    /// Amount paid; one credit is awarded per whole unit
    #[schema(value_type = f64)]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
    /// Reference to an uploaded receipt or screenshot
    pub proof_reference: Option<String>,
    /// Transaction id from the bank or wallet
    pub external_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentTransactionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub payment_method_id: PaymentMethodId,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub proof_reference: Option<String>,
    pub admin_notes: Option<String>,
    pub credits_awarded: i64,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            payment_method_id: db.payment_method_id,
            amount: db.amount,
            currency: db.currency,
            status: db.status,
            external_transaction_id: db.external_transaction_id,
            proof_reference: db.proof_reference,
            admin_notes: db.admin_notes,
            credits_awarded: db.credits_awarded,
            reviewed_by: db.reviewed_by,
            reviewed_at: db.reviewed_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCreateResponse {
    pub payment: PaymentResponse,
    pub message: String,
}

impl From<PaymentReceipt> for PaymentCreateResponse {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            payment: receipt.payment.into(),
            message: receipt.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentReviewRequest {
    pub decision: ReviewDecision,
    pub admin_notes: Option<String>,
    /// Credits to award on approval; defaults to the whole-unit amount
    pub credits_to_award: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentReviewResponse {
    pub payment: PaymentResponse,
    pub message: String,
}

impl From<PaymentDBResponse> for PaymentReviewResponse {
    fn from(payment: PaymentDBResponse) -> Self {
        let message = match payment.status {
            PaymentStatus::Approved => format!("Payment approved. {} credits added.", payment.credits_awarded),
            PaymentStatus::Rejected => "Payment rejected. No credits were added.".to_string(),
            other => format!("Payment is {}.", other.as_str()),
        };
        Self {
            payment: payment.into(),
            message,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPaymentsQuery {
    /// Filter by status
    pub status: Option<PaymentStatus>,

    /// Filter by user (admin only)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,

    /// Number of items to skip
    pub skip: Option<i64>,

    /// Maximum number of items to return
    pub limit: Option<i64>,
}
